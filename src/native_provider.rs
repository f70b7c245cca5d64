//! In-process OpenSSL provider.
//!
//! RSA generation and CSR signing go through the `openssl` crate on a
//! blocking thread so they never stall the async runtime.

use crate::crypto_provider::{CryptoProvider, GeneratedKeyPair};
use crate::subject::{Subject, SubjectAttribute};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{Id, PKey, PKeyRef, Public};
use openssl::rsa::Rsa;
use openssl::x509::{X509NameBuilder, X509Req, X509ReqRef};

// PKCS#10 only defines version 1, encoded as 0
const X509_REQ_VERSION_1: i32 = 0;

pub const VERIFY_OK_LINE: &str = "Certificate request self-signature verify OK";

#[derive(Debug, Clone, Copy, Default)]
pub struct OpensslNativeProvider;

impl OpensslNativeProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CryptoProvider for OpensslNativeProvider {
    fn name(&self) -> &'static str {
        "openssl-native"
    }

    async fn generate_key_and_csr(
        &self,
        subject: &Subject,
        key_size_bits: u32,
    ) -> Result<GeneratedKeyPair> {
        let subject = subject.clone();
        tokio::task::spawn_blocking(move || generate_blocking(&subject, key_size_bits))
            .await
            .context("Key generation task panicked")?
    }

    async fn verify_csr_self_consistency(&self, csr_pem: &str) -> Result<String> {
        let csr_pem = csr_pem.to_string();
        tokio::task::spawn_blocking(move || verify_blocking(&csr_pem))
            .await
            .context("Verification task panicked")?
    }

    async fn tool_version(&self) -> Result<String> {
        Ok(openssl::version::version().to_string())
    }
}

fn nid_for(attribute: SubjectAttribute) -> Nid {
    match attribute {
        SubjectAttribute::CommonName => Nid::COMMONNAME,
        SubjectAttribute::Country => Nid::COUNTRYNAME,
        SubjectAttribute::State => Nid::STATEORPROVINCENAME,
        SubjectAttribute::Locality => Nid::LOCALITYNAME,
        SubjectAttribute::Organization => Nid::ORGANIZATIONNAME,
        SubjectAttribute::OrganizationalUnit => Nid::ORGANIZATIONALUNITNAME,
        SubjectAttribute::EmailAddress => Nid::PKCS9_EMAILADDRESS,
    }
}

fn generate_blocking(subject: &Subject, key_size_bits: u32) -> Result<GeneratedKeyPair> {
    let rsa = Rsa::generate(key_size_bits)
        .map_err(|e| anyhow!("Failed to generate RSA keypair: {}", e))?;
    let private_key =
        PKey::from_rsa(rsa).map_err(|e| anyhow!("Failed to create private key: {}", e))?;

    let mut name_builder =
        X509NameBuilder::new().map_err(|e| anyhow!("Failed to create name builder: {}", e))?;
    for (attribute, value) in subject.entries() {
        name_builder
            .append_entry_by_nid(nid_for(*attribute), value.as_str())
            .map_err(|e| anyhow!("Failed to set {}: {}", attribute.code(), e))?;
    }
    let name = name_builder.build();

    let mut builder =
        X509Req::builder().map_err(|e| anyhow!("Failed to create CSR builder: {}", e))?;
    builder
        .set_version(X509_REQ_VERSION_1)
        .map_err(|e| anyhow!("Failed to set version: {}", e))?;
    builder
        .set_subject_name(&name)
        .map_err(|e| anyhow!("Failed to set subject: {}", e))?;
    builder
        .set_pubkey(&private_key)
        .map_err(|e| anyhow!("Failed to set public key: {}", e))?;
    builder
        .sign(&private_key, MessageDigest::sha256())
        .map_err(|e| anyhow!("Failed to sign CSR: {}", e))?;
    let csr = builder.build();

    let csr_pem = String::from_utf8(csr.to_pem()?).context("CSR PEM is not UTF-8")?;
    let key_pem = String::from_utf8(private_key.private_key_to_pem_pkcs8()?)
        .context("Private key PEM is not UTF-8")?;

    Ok(GeneratedKeyPair::new(key_pem, csr_pem))
}

fn verify_blocking(csr_pem: &str) -> Result<String> {
    let request =
        X509Req::from_pem(csr_pem.as_bytes()).context("Failed to parse certificate request")?;
    let public_key = request
        .public_key()
        .context("Failed to extract public key from certificate request")?;

    let valid = request
        .verify(&public_key)
        .context("Failed to check certificate request signature")?;
    if !valid {
        bail!("Certificate request signature does not match its public key");
    }

    Ok(render_report(&request, &public_key))
}

/// Text summary in the spirit of `openssl req -text -verify`.
fn render_report(request: &X509ReqRef, public_key: &PKeyRef<Public>) -> String {
    let subject = request
        .subject_name()
        .entries()
        .map(|entry| {
            let code = entry.object().nid().short_name().unwrap_or("UNDEF");
            let value = entry
                .data()
                .to_string()
                .unwrap_or_else(|_| "<unreadable>".to_string());
            format!("{} = {}", code, value)
        })
        .collect::<Vec<_>>()
        .join(", ");

    let key_id = public_key.id();
    let algorithm = if key_id == Id::RSA {
        "rsaEncryption".to_string()
    } else if key_id == Id::EC {
        "id-ecPublicKey".to_string()
    } else {
        format!("{:?}", key_id)
    };
    let version = request.version();

    format!(
        "{ok}\n\
         Certificate Request:\n    \
         Data:\n        \
         Version: {display_version} (0x{version:x})\n        \
         Subject: {subject}\n        \
         Subject Public Key Info:\n            \
         Public Key Algorithm: {algorithm}\n                \
         Public-Key: ({bits} bit)\n",
        ok = VERIFY_OK_LINE,
        display_version = version + 1,
        version = version,
        subject = subject,
        algorithm = algorithm,
        bits = public_key.bits(),
    )
}

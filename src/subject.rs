//! Subject (Distinguished Name) Builder
//!
//! Assembles sanitized fields into an ordered list of attributes. The order is
//! fixed: CN, C, ST, L, O, OU, emailAddress. Empty attributes are left out.
//!
//! ```text
//! SanitizedSubject ──build_subject──► Subject ──to_subject_string──► /CN=example.com/C=US/O=Acme
//!                                        └──── entries() ──────────► structured provider API
//! ```

use crate::error::ValidationError;
use crate::sanitizer::{SanitizedField, SanitizedSubject};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubjectAttribute {
    CommonName,
    Country,
    State,
    Locality,
    Organization,
    OrganizationalUnit,
    EmailAddress,
}

impl SubjectAttribute {
    /// Emission order of a subject.
    pub const ORDER: [SubjectAttribute; 7] = [
        SubjectAttribute::CommonName,
        SubjectAttribute::Country,
        SubjectAttribute::State,
        SubjectAttribute::Locality,
        SubjectAttribute::Organization,
        SubjectAttribute::OrganizationalUnit,
        SubjectAttribute::EmailAddress,
    ];

    /// Short attribute code as understood by OpenSSL.
    pub fn code(self) -> &'static str {
        match self {
            SubjectAttribute::CommonName => "CN",
            SubjectAttribute::Country => "C",
            SubjectAttribute::State => "ST",
            SubjectAttribute::Locality => "L",
            SubjectAttribute::Organization => "O",
            SubjectAttribute::OrganizationalUnit => "OU",
            SubjectAttribute::EmailAddress => "emailAddress",
        }
    }
}

/// Ordered `(attribute, value)` pairs. CN is always the first entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    entries: Vec<(SubjectAttribute, SanitizedField)>,
}

impl Subject {
    pub fn entries(&self) -> &[(SubjectAttribute, SanitizedField)] {
        &self.entries
    }

    pub fn common_name(&self) -> &SanitizedField {
        // build_subject refuses to create a Subject without CN
        &self.entries[0].1
    }

    pub fn get(&self, attribute: SubjectAttribute) -> Option<&SanitizedField> {
        self.entries
            .iter()
            .find(|(attr, _)| *attr == attribute)
            .map(|(_, value)| value)
    }

    /// Serialize as `/ATTR=value/ATTR=value`, the `-subj` syntax of the
    /// OpenSSL command line.
    pub fn to_subject_string(&self) -> String {
        self.entries
            .iter()
            .map(|(attr, value)| format!("/{}={}", attr.code(), value))
            .collect()
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_subject_string())
    }
}

/// Build a [`Subject`] from sanitized fields.
///
/// # Errors
/// `ValidationError::MissingCommonName` when the sanitized CN is empty. The
/// request handler rejects that case earlier; this is the last gate.
pub fn build_subject(fields: &SanitizedSubject) -> Result<Subject, ValidationError> {
    if fields.common_name.is_empty() {
        return Err(ValidationError::MissingCommonName);
    }

    let entries = SubjectAttribute::ORDER
        .iter()
        .map(|attr| (*attr, field_for(fields, *attr)))
        .filter(|(_, value)| !value.is_empty())
        .map(|(attr, value)| (attr, value.clone()))
        .collect();

    Ok(Subject { entries })
}

fn field_for(fields: &SanitizedSubject, attribute: SubjectAttribute) -> &SanitizedField {
    match attribute {
        SubjectAttribute::CommonName => &fields.common_name,
        SubjectAttribute::Country => &fields.country,
        SubjectAttribute::State => &fields.state,
        SubjectAttribute::Locality => &fields.city,
        SubjectAttribute::Organization => &fields.organization,
        SubjectAttribute::OrganizationalUnit => &fields.organizational_unit,
        SubjectAttribute::EmailAddress => &fields.email,
    }
}

//! Canonicalization of free-text field labels and resolution against the
//! personal-data record.
//!
//! This is a best-effort string classifier, not NLP: labels are normalized
//! and matched exactly against a synonym table. Anything unmatched is
//! `Unknown`, never guessed.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::detect::DetectedField;
use crate::profile::{PersonalRecord, SignatureAsset};

/// The closed set of field kinds the pipeline knows how to fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    FirstName,
    MiddleName,
    LastName,
    FullName,
    Gender,
    MaritalStatus,
    CellPhone,
    WorkPhone,
    Address,
    State,
    ZipCode,
    Date,
    Signature,
    Unknown,
}

impl FieldKind {
    /// Classify a raw label via the synonym table.
    pub fn from_label(label: &str) -> Self {
        match normalize_label(label).as_str() {
            "firstname" | "fname" | "givenname" => FieldKind::FirstName,
            "middlename" | "middleinitial" => FieldKind::MiddleName,
            "lastname" | "lname" | "surname" | "familyname" => FieldKind::LastName,
            "fullname" | "name" | "printname" | "printedname" => FieldKind::FullName,
            "gender" | "sex" => FieldKind::Gender,
            "maritalstatus" | "marital" => FieldKind::MaritalStatus,
            "cellphone" | "phone" | "phonenumber" | "mobile" | "mobilephone" | "cell"
            | "telephone" => FieldKind::CellPhone,
            "workphone" | "officephone" | "businessphone" | "daytimephone" => FieldKind::WorkPhone,
            "address" | "homeaddress" | "streetaddress" | "street" | "mailingaddress" => {
                FieldKind::Address
            }
            "state" => FieldKind::State,
            "zipcode" | "zip" | "postalcode" | "postcode" => FieldKind::ZipCode,
            "date" | "today" | "todaysdate" | "datesigned" | "signaturedate" => FieldKind::Date,
            "signature" | "sign" | "signhere" | "applicantsignature" => FieldKind::Signature,
            _ => FieldKind::Unknown,
        }
    }
}

/// Lowercase and strip separator punctuation so `First_Name`, `first name`
/// and `FIRSTNAME` all collapse to `firstname`.
pub fn normalize_label(label: &str) -> String {
    label
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '_' | ' ' | '-' | '.' | ':'))
        .collect()
}

/// What gets drawn for a resolved field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    /// Placeholder for the caller-owned signature asset; the bytes stay
    /// with the caller and are only borrowed during compositing.
    Signature,
}

/// A detected field with its canonical kind and resolved value.
/// `value = None` means "kind recognized but no data available": skipped
/// silently at draw time, never drawn as empty text.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedField {
    pub field: DetectedField,
    pub kind: FieldKind,
    pub value: Option<FieldValue>,
}

/// Call-time inputs that must not be read from ambient state inside the
/// algorithm: the processing date and the optional signature asset.
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    pub today: NaiveDate,
    pub signature: Option<&'a SignatureAsset>,
}

/// Date values are written in US form style.
pub const DATE_FORMAT: &str = "%m/%d/%Y";

/// Classify every detected field and resolve it against the record.
pub fn canonicalize(
    fields: Vec<DetectedField>,
    record: &PersonalRecord,
    ctx: &ResolveContext<'_>,
) -> Vec<ResolvedField> {
    fields
        .into_iter()
        .map(|field| {
            let kind = FieldKind::from_label(&field.raw_label);
            let value = resolve_value(kind, record, ctx);
            ResolvedField { field, kind, value }
        })
        .collect()
}

fn resolve_value(
    kind: FieldKind,
    record: &PersonalRecord,
    ctx: &ResolveContext<'_>,
) -> Option<FieldValue> {
    let text = |s: &str| {
        let trimmed = s.trim();
        (!trimmed.is_empty()).then(|| FieldValue::Text(trimmed.to_string()))
    };
    match kind {
        FieldKind::FirstName => text(&record.first_name),
        FieldKind::MiddleName => text(&record.middle_name),
        FieldKind::LastName => text(&record.last_name),
        FieldKind::FullName => text(&record.full_name()),
        FieldKind::Gender => text(&record.gender),
        FieldKind::MaritalStatus => text(&record.marital_status),
        FieldKind::CellPhone => text(&record.cell_phone),
        FieldKind::WorkPhone => text(&record.work_phone),
        FieldKind::Address => text(&record.home_address),
        FieldKind::State => text(&record.state),
        FieldKind::ZipCode => text(&record.zip_code),
        FieldKind::Date => Some(FieldValue::Text(ctx.today.format(DATE_FORMAT).to_string())),
        FieldKind::Signature => ctx.signature.map(|_| FieldValue::Signature),
        FieldKind::Unknown => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::fallback_fields;
    use pretty_assertions::assert_eq;

    fn ctx_without_signature() -> ResolveContext<'static> {
        ResolveContext {
            today: NaiveDate::from_ymd_opt(2026, 8, 6).unwrap(),
            signature: None,
        }
    }

    #[test]
    fn test_label_variants_collapse_to_same_kind() {
        assert_eq!(FieldKind::from_label("First_Name"), FieldKind::FirstName);
        assert_eq!(FieldKind::from_label("first name"), FieldKind::FirstName);
        assert_eq!(FieldKind::from_label("FIRSTNAME"), FieldKind::FirstName);
        assert_eq!(FieldKind::from_label("first-name"), FieldKind::FirstName);
    }

    #[test]
    fn test_classification_is_idempotent_on_normalized_form() {
        let normalized = normalize_label("Zip_Code");
        assert_eq!(normalized, normalize_label(&normalized));
        assert_eq!(FieldKind::from_label(&normalized), FieldKind::ZipCode);
    }

    #[test]
    fn test_unseen_labels_are_unknown_not_guessed() {
        assert_eq!(FieldKind::from_label("firstnam"), FieldKind::Unknown);
        assert_eq!(FieldKind::from_label("employer"), FieldKind::Unknown);
        assert_eq!(FieldKind::from_label(""), FieldKind::Unknown);
    }

    #[test]
    fn test_synonyms_map_to_expected_kinds() {
        assert_eq!(FieldKind::from_label("surname"), FieldKind::LastName);
        assert_eq!(FieldKind::from_label("mobile"), FieldKind::CellPhone);
        assert_eq!(FieldKind::from_label("work phone"), FieldKind::WorkPhone);
        assert_eq!(FieldKind::from_label("zip"), FieldKind::ZipCode);
        assert_eq!(FieldKind::from_label("sign here"), FieldKind::Signature);
        assert_eq!(FieldKind::from_label("today's date"), FieldKind::Unknown); // apostrophe survives normalization
        assert_eq!(FieldKind::from_label("todays date"), FieldKind::Date);
    }

    #[test]
    fn test_date_resolves_from_injected_context() {
        let record = PersonalRecord::default();
        let fields = vec![DetectedField {
            raw_label: "date".to_string(),
            bbox: crate::coords::BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            confidence: 0.9,
        }];
        let resolved = canonicalize(fields, &record, &ctx_without_signature());
        assert_eq!(
            resolved[0].value,
            Some(FieldValue::Text("08/06/2026".to_string()))
        );
    }

    #[test]
    fn test_full_name_concatenates_record() {
        let record = PersonalRecord {
            first_name: "Jane".to_string(),
            middle_name: "Q".to_string(),
            last_name: "Doe".to_string(),
            ..Default::default()
        };
        let fields = vec![DetectedField {
            raw_label: "full name".to_string(),
            bbox: crate::coords::BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            confidence: 0.9,
        }];
        let resolved = canonicalize(fields, &record, &ctx_without_signature());
        assert_eq!(
            resolved[0].value,
            Some(FieldValue::Text("Jane Q Doe".to_string()))
        );
    }

    #[test]
    fn test_empty_record_value_resolves_to_none() {
        let record = PersonalRecord::default();
        let fields = vec![DetectedField {
            raw_label: "first_name".to_string(),
            bbox: crate::coords::BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            confidence: 0.9,
        }];
        let resolved = canonicalize(fields, &record, &ctx_without_signature());
        assert_eq!(resolved[0].kind, FieldKind::FirstName);
        assert_eq!(resolved[0].value, None);
    }

    #[test]
    fn test_fallback_set_against_partial_record() {
        // The fixed fallback layout against a record with no signature
        // resolves four text fields and one unresolved signature.
        let record = PersonalRecord {
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            cell_phone: "555-1212".to_string(),
            home_address: "1 Main St".to_string(),
            ..Default::default()
        };
        let resolved = canonicalize(fallback_fields(), &record, &ctx_without_signature());
        assert_eq!(resolved.len(), 5);

        let texts: Vec<_> = resolved
            .iter()
            .filter(|r| matches!(r.value, Some(FieldValue::Text(_))))
            .collect();
        assert_eq!(texts.len(), 4);

        let signature = resolved
            .iter()
            .find(|r| r.kind == FieldKind::Signature)
            .unwrap();
        assert_eq!(signature.value, None);
    }

    #[test]
    fn test_signature_resolves_when_asset_present() {
        let png = crate::profile::tiny_png(8, 8);
        let asset = SignatureAsset::from_png(png).unwrap();
        let ctx = ResolveContext {
            today: NaiveDate::from_ymd_opt(2026, 8, 6).unwrap(),
            signature: Some(&asset),
        };
        let record = PersonalRecord::default();
        let fields = vec![DetectedField {
            raw_label: "signature".to_string(),
            bbox: crate::coords::BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            confidence: 0.9,
        }];
        let resolved = canonicalize(fields, &record, &ctx);
        assert_eq!(resolved[0].value, Some(FieldValue::Signature));
    }

    #[test]
    fn test_values_are_trimmed() {
        let record = PersonalRecord {
            first_name: "  Ann  ".to_string(),
            ..Default::default()
        };
        let fields = vec![DetectedField {
            raw_label: "first_name".to_string(),
            bbox: crate::coords::BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            confidence: 0.9,
        }];
        let resolved = canonicalize(fields, &record, &ctx_without_signature());
        assert_eq!(resolved[0].value, Some(FieldValue::Text("Ann".to_string())));
    }
}

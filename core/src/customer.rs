//! Customer records: the raw wire form and the validated typed form.
//!
//! RULE: Nothing downstream of validation ever sees a free-form string.
//! Every categorical attribute is a closed enum, so an unseen category
//! is rejected here with a FeatureError instead of being silently
//! misencoded by the feature deriver.

use crate::{
    error::{ChurnError, ChurnResult},
    types::CustomerId,
};
use serde::{Deserialize, Serialize};

/// Declares a closed categorical vocabulary with its canonical labels.
macro_rules! vocabulary {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $label)] $variant,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }

            /// Parse a label, raising a FeatureError naming `field` on
            /// anything outside the vocabulary.
            pub fn parse(field: &str, value: &str) -> ChurnResult<Self> {
                match value.trim() {
                    $($label => Ok($name::$variant),)+
                    other => Err(ChurnError::feature(
                        field,
                        other,
                        &format!("expected one of {:?}", [$($label),+]),
                    )),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

vocabulary!(Gender {
    Male   => "Male",
    Female => "Female",
});

vocabulary!(YesNo {
    Yes => "Yes",
    No  => "No",
});

vocabulary!(MultipleLines {
    Yes            => "Yes",
    No             => "No",
    NoPhoneService => "No phone service",
});

vocabulary!(InternetService {
    Dsl        => "DSL",
    FiberOptic => "Fiber optic",
    No         => "No",
});

vocabulary!(
    /// Shared vocabulary of the six internet add-on services.
    AddOn {
        Yes               => "Yes",
        No                => "No",
        NoInternetService => "No internet service",
    }
);

vocabulary!(Contract {
    MonthToMonth => "Month-to-month",
    OneYear      => "One year",
    TwoYear      => "Two year",
});

vocabulary!(PaymentMethod {
    ElectronicCheck => "Electronic check",
    MailedCheck     => "Mailed check",
    BankTransfer    => "Bank transfer (automatic)",
    CreditCard      => "Credit card (automatic)",
});

impl YesNo {
    pub fn is_yes(&self) -> bool {
        matches!(self, YesNo::Yes)
    }
}

impl AddOn {
    pub fn is_yes(&self) -> bool {
        matches!(self, AddOn::Yes)
    }
}

impl PaymentMethod {
    pub fn is_automatic(&self) -> bool {
        matches!(self, PaymentMethod::BankTransfer | PaymentMethod::CreditCard)
    }
}

// ── Raw form ─────────────────────────────────────────────────────────────────

/// TotalCharges arrives as a number over JSON but as text (possibly a
/// single blank) in the telco CSV export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChargeField {
    Number(f64),
    Text(String),
}

/// A customer record exactly as a caller submits it.
/// Field names follow the telco CSV header spelling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCustomerRecord {
    pub gender: String,
    #[serde(rename = "SeniorCitizen")]
    pub senior_citizen: i64,
    #[serde(rename = "Partner")]
    pub partner: String,
    #[serde(rename = "Dependents")]
    pub dependents: String,
    pub tenure: i64,
    #[serde(rename = "PhoneService")]
    pub phone_service: String,
    #[serde(rename = "MultipleLines")]
    pub multiple_lines: String,
    #[serde(rename = "InternetService")]
    pub internet_service: String,
    #[serde(rename = "OnlineSecurity")]
    pub online_security: String,
    #[serde(rename = "OnlineBackup")]
    pub online_backup: String,
    #[serde(rename = "DeviceProtection")]
    pub device_protection: String,
    #[serde(rename = "TechSupport")]
    pub tech_support: String,
    #[serde(rename = "StreamingTV")]
    pub streaming_tv: String,
    #[serde(rename = "StreamingMovies")]
    pub streaming_movies: String,
    #[serde(rename = "Contract")]
    pub contract: String,
    #[serde(rename = "PaperlessBilling")]
    pub paperless_billing: String,
    #[serde(rename = "PaymentMethod")]
    pub payment_method: String,
    #[serde(rename = "MonthlyCharges")]
    pub monthly_charges: f64,
    #[serde(rename = "TotalCharges", default)]
    pub total_charges: Option<ChargeField>,
}

impl RawCustomerRecord {
    /// Check every field against its vocabulary and numeric invariant.
    pub fn validate(&self) -> ChurnResult<CustomerRecord> {
        let senior_citizen = match self.senior_citizen {
            0 => false,
            1 => true,
            other => {
                return Err(ChurnError::feature(
                    "SeniorCitizen",
                    other.to_string(),
                    "expected 0 or 1",
                ))
            }
        };

        let tenure = u32::try_from(self.tenure).map_err(|_| {
            ChurnError::feature("tenure", self.tenure.to_string(), "expected a non-negative month count")
        })?;

        let monthly_charges = non_negative("MonthlyCharges", self.monthly_charges)?;

        let total_charges = match &self.total_charges {
            None => 0.0,
            Some(ChargeField::Number(v)) => non_negative("TotalCharges", *v)?,
            Some(ChargeField::Text(s)) if s.trim().is_empty() => 0.0,
            Some(ChargeField::Text(s)) => {
                let v: f64 = s.trim().parse().map_err(|_| {
                    ChurnError::feature("TotalCharges", s.as_str(), "expected a number or blank")
                })?;
                non_negative("TotalCharges", v)?
            }
        };

        Ok(CustomerRecord {
            gender:            Gender::parse("gender", &self.gender)?,
            senior_citizen,
            partner:           YesNo::parse("Partner", &self.partner)?,
            dependents:        YesNo::parse("Dependents", &self.dependents)?,
            tenure,
            phone_service:     YesNo::parse("PhoneService", &self.phone_service)?,
            multiple_lines:    MultipleLines::parse("MultipleLines", &self.multiple_lines)?,
            internet_service:  InternetService::parse("InternetService", &self.internet_service)?,
            online_security:   AddOn::parse("OnlineSecurity", &self.online_security)?,
            online_backup:     AddOn::parse("OnlineBackup", &self.online_backup)?,
            device_protection: AddOn::parse("DeviceProtection", &self.device_protection)?,
            tech_support:      AddOn::parse("TechSupport", &self.tech_support)?,
            streaming_tv:      AddOn::parse("StreamingTV", &self.streaming_tv)?,
            streaming_movies:  AddOn::parse("StreamingMovies", &self.streaming_movies)?,
            contract:          Contract::parse("Contract", &self.contract)?,
            paperless_billing: YesNo::parse("PaperlessBilling", &self.paperless_billing)?,
            payment_method:    PaymentMethod::parse("PaymentMethod", &self.payment_method)?,
            monthly_charges,
            total_charges,
        })
    }
}

fn non_negative(field: &str, value: f64) -> ChurnResult<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ChurnError::feature(field, value.to_string(), "expected a finite, non-negative amount"))
    }
}

// ── Validated form ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub gender:            Gender,
    pub senior_citizen:    bool,
    pub partner:           YesNo,
    pub dependents:        YesNo,
    pub tenure:            u32,
    pub phone_service:     YesNo,
    pub multiple_lines:    MultipleLines,
    pub internet_service:  InternetService,
    pub online_security:   AddOn,
    pub online_backup:     AddOn,
    pub device_protection: AddOn,
    pub tech_support:      AddOn,
    pub streaming_tv:      AddOn,
    pub streaming_movies:  AddOn,
    pub contract:          Contract,
    pub paperless_billing: YesNo,
    pub payment_method:    PaymentMethod,
    pub monthly_charges:   f64,
    pub total_charges:     f64,
}

impl CustomerRecord {
    /// The six internet add-ons in a fixed order.
    pub fn add_ons(&self) -> [AddOn; 6] {
        [
            self.online_security,
            self.online_backup,
            self.device_protection,
            self.tech_support,
            self.streaming_tv,
            self.streaming_movies,
        ]
    }

    /// Convert back to the wire form. `validate()` on the result yields
    /// an equal record.
    pub fn to_raw(&self) -> RawCustomerRecord {
        RawCustomerRecord {
            gender:            self.gender.as_str().into(),
            senior_citizen:    i64::from(self.senior_citizen),
            partner:           self.partner.as_str().into(),
            dependents:        self.dependents.as_str().into(),
            tenure:            i64::from(self.tenure),
            phone_service:     self.phone_service.as_str().into(),
            multiple_lines:    self.multiple_lines.as_str().into(),
            internet_service:  self.internet_service.as_str().into(),
            online_security:   self.online_security.as_str().into(),
            online_backup:     self.online_backup.as_str().into(),
            device_protection: self.device_protection.as_str().into(),
            tech_support:      self.tech_support.as_str().into(),
            streaming_tv:      self.streaming_tv.as_str().into(),
            streaming_movies:  self.streaming_movies.as_str().into(),
            contract:          self.contract.as_str().into(),
            paperless_billing: self.paperless_billing.as_str().into(),
            payment_method:    self.payment_method.as_str().into(),
            monthly_charges:   self.monthly_charges,
            total_charges:     Some(ChargeField::Number(self.total_charges)),
        }
    }
}

/// A customer whose churn outcome is known. One row of the population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledCustomer {
    pub customer_id: CustomerId,
    pub record:      CustomerRecord,
    pub churned:     bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> RawCustomerRecord {
        RawCustomerRecord {
            gender:            "Female".into(),
            senior_citizen:    0,
            partner:           "Yes".into(),
            dependents:        "No".into(),
            tenure:            1,
            phone_service:     "No".into(),
            multiple_lines:    "No phone service".into(),
            internet_service:  "DSL".into(),
            online_security:   "No".into(),
            online_backup:     "Yes".into(),
            device_protection: "No".into(),
            tech_support:      "No".into(),
            streaming_tv:      "No".into(),
            streaming_movies:  "No".into(),
            contract:          "Month-to-month".into(),
            paperless_billing: "Yes".into(),
            payment_method:    "Electronic check".into(),
            monthly_charges:   29.85,
            total_charges:     Some(ChargeField::Text(" ".into())),
        }
    }

    #[test]
    fn blank_total_charges_is_zero() {
        let record = raw().validate().unwrap();
        assert_eq!(record.total_charges, 0.0);
        assert_eq!(record.contract, Contract::MonthToMonth);
    }

    #[test]
    fn unknown_payment_method_names_the_field() {
        let mut r = raw();
        r.payment_method = "Bitcoin".into();
        match r.validate() {
            Err(ChurnError::Feature { field, value, .. }) => {
                assert_eq!(field, "PaymentMethod");
                assert_eq!(value, "Bitcoin");
            }
            other => panic!("expected FeatureError, got {other:?}"),
        }
    }

    #[test]
    fn negative_tenure_rejected() {
        let mut r = raw();
        r.tenure = -3;
        assert!(matches!(r.validate(), Err(ChurnError::Feature { .. })));
    }

    #[test]
    fn raw_json_without_total_charges_parses() {
        let json = serde_json::json!({
            "gender": "Male", "SeniorCitizen": 1, "Partner": "No", "Dependents": "No",
            "tenure": 5, "PhoneService": "Yes", "MultipleLines": "Yes",
            "InternetService": "Fiber optic", "OnlineSecurity": "No", "OnlineBackup": "No",
            "DeviceProtection": "No", "TechSupport": "No", "StreamingTV": "Yes",
            "StreamingMovies": "Yes", "Contract": "Month-to-month", "PaperlessBilling": "Yes",
            "PaymentMethod": "Mailed check", "MonthlyCharges": 99.5
        });
        let raw: RawCustomerRecord = serde_json::from_value(json).unwrap();
        let record = raw.validate().unwrap();
        assert_eq!(record.total_charges, 0.0);
        assert!(record.senior_citizen);
    }

    #[test]
    fn to_raw_round_trips_through_validation() {
        let record = raw().validate().unwrap();
        assert_eq!(record.to_raw().validate().unwrap(), record);
    }
}

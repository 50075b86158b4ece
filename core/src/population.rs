//! The labeled customer population the analyzer runs over.
//!
//! A Population is a read-only snapshot. Loading it (from the store, a
//! CSV export or the synthetic generator) happens outside the analyzer.

use crate::{
    customer::{ChargeField, LabeledCustomer, RawCustomerRecord, YesNo},
    error::{ChurnError, ChurnResult},
};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, io::Read, path::Path};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Population {
    customers: Vec<LabeledCustomer>,
}

impl Population {
    pub fn new(customers: Vec<LabeledCustomer>) -> Self {
        Self { customers }
    }

    pub fn customers(&self) -> &[LabeledCustomer] {
        &self.customers
    }

    pub fn len(&self) -> usize {
        self.customers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.customers.is_empty()
    }

    pub fn churned_count(&self) -> usize {
        self.customers.iter().filter(|c| c.churned).count()
    }

    /// Fraction of customers who churned; 0 for an empty population.
    pub fn churn_rate(&self) -> f64 {
        if self.customers.is_empty() {
            0.0
        } else {
            self.churned_count() as f64 / self.customers.len() as f64
        }
    }

    pub fn churned(&self) -> impl Iterator<Item = &LabeledCustomer> {
        self.customers.iter().filter(|c| c.churned)
    }

    pub fn retained(&self) -> impl Iterator<Item = &LabeledCustomer> {
        self.customers.iter().filter(|c| !c.churned)
    }

    pub fn from_csv_path(path: &Path) -> ChurnResult<Self> {
        let file = std::fs::File::open(path)?;
        let population = Self::from_csv_reader(file)?;
        log::info!(
            "loaded {} customers ({} churned) from {}",
            population.len(),
            population.churned_count(),
            path.display()
        );
        Ok(population)
    }

    /// Parse the telco export layout: one header row, a `customerID`
    /// column, the nineteen attribute columns and a `Churn` Yes/No column.
    /// Extra columns are ignored. Every row is validated, and a repeated
    /// `customerID` is a FeatureError.
    pub fn from_csv_reader<R: Read>(reader: R) -> ChurnResult<Self> {
        let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers = rdr.headers()?.clone();
        let columns = Columns::resolve(&headers)?;

        let mut customers = Vec::new();
        let mut seen = HashSet::new();
        for (row, result) in rdr.records().enumerate() {
            let record = result?;
            let customer = columns.parse(&record, row + 1)?;
            if !seen.insert(customer.customer_id.clone()) {
                return Err(ChurnError::feature(
                    "customerID",
                    customer.customer_id,
                    &format!("duplicate id at row {}", row + 1),
                ));
            }
            customers.push(customer);
        }
        Ok(Self { customers })
    }
}

// ── CSV column mapping ───────────────────────────────────────────────────────

const ATTRIBUTE_COLUMNS: [&str; 19] = [
    "gender",
    "SeniorCitizen",
    "Partner",
    "Dependents",
    "tenure",
    "PhoneService",
    "MultipleLines",
    "InternetService",
    "OnlineSecurity",
    "OnlineBackup",
    "DeviceProtection",
    "TechSupport",
    "StreamingTV",
    "StreamingMovies",
    "Contract",
    "PaperlessBilling",
    "PaymentMethod",
    "MonthlyCharges",
    "TotalCharges",
];

struct Columns {
    customer_id: Option<usize>,
    churn:       usize,
    attributes:  [usize; 19],
}

impl Columns {
    fn resolve(headers: &csv::StringRecord) -> ChurnResult<Self> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);
        let require = |name: &str| {
            find(name).ok_or_else(|| ChurnError::feature(name, "", "column missing from CSV header"))
        };

        let mut attributes = [0usize; 19];
        for (slot, name) in attributes.iter_mut().zip(ATTRIBUTE_COLUMNS) {
            *slot = require(name)?;
        }
        Ok(Self {
            customer_id: find("customerID"),
            churn: require("Churn")?,
            attributes,
        })
    }

    fn parse(&self, record: &csv::StringRecord, row: usize) -> ChurnResult<LabeledCustomer> {
        let field = |i: usize| record.get(self.attributes[i]).unwrap_or("").trim();

        let raw = RawCustomerRecord {
            gender:            field(0).to_string(),
            senior_citizen:    parse_int("SeniorCitizen", field(1))?,
            partner:           field(2).to_string(),
            dependents:        field(3).to_string(),
            tenure:            parse_int("tenure", field(4))?,
            phone_service:     field(5).to_string(),
            multiple_lines:    field(6).to_string(),
            internet_service:  field(7).to_string(),
            online_security:   field(8).to_string(),
            online_backup:     field(9).to_string(),
            device_protection: field(10).to_string(),
            tech_support:      field(11).to_string(),
            streaming_tv:      field(12).to_string(),
            streaming_movies:  field(13).to_string(),
            contract:          field(14).to_string(),
            paperless_billing: field(15).to_string(),
            payment_method:    field(16).to_string(),
            monthly_charges:   parse_float("MonthlyCharges", field(17))?,
            total_charges:     Some(ChargeField::Text(field(18).to_string())),
        };

        let customer_id = self
            .customer_id
            .and_then(|i| record.get(i))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("row-{row}"));

        let churn = YesNo::parse("Churn", record.get(self.churn).unwrap_or(""))?;

        Ok(LabeledCustomer {
            customer_id,
            record: raw.validate()?,
            churned: churn.is_yes(),
        })
    }
}

fn parse_int(field: &str, value: &str) -> ChurnResult<i64> {
    value.parse().map_err(|_| ChurnError::feature(field, value, "expected an integer"))
}

fn parse_float(field: &str, value: &str) -> ChurnResult<f64> {
    value.parse().map_err(|_| ChurnError::feature(field, value, "expected a number"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "customerID,gender,SeniorCitizen,Partner,Dependents,tenure,PhoneService,MultipleLines,InternetService,OnlineSecurity,OnlineBackup,DeviceProtection,TechSupport,StreamingTV,StreamingMovies,Contract,PaperlessBilling,PaymentMethod,MonthlyCharges,TotalCharges,Churn";

    #[test]
    fn parses_telco_rows_with_blank_total() {
        let csv = format!(
            "{HEADER}\n\
             7590-VHVEG,Female,0,Yes,No,1,No,No phone service,DSL,No,Yes,No,No,No,No,Month-to-month,Yes,Electronic check,29.85,29.85,No\n\
             4472-LVYGI,Female,0,Yes,Yes,0,No,No phone service,DSL,Yes,No,Yes,Yes,Yes,No,Two year,Yes,Bank transfer (automatic),52.55, ,No\n\
             3668-QPYBK,Male,0,No,No,2,Yes,No,DSL,Yes,Yes,No,No,No,No,Month-to-month,Yes,Mailed check,53.85,108.15,Yes\n"
        );
        let p = Population::from_csv_reader(csv.as_bytes()).unwrap();
        assert_eq!(p.len(), 3);
        assert_eq!(p.churned_count(), 1);
        assert_eq!(p.customers()[1].record.total_charges, 0.0);
        assert_eq!(p.customers()[2].customer_id, "3668-QPYBK");
    }

    #[test]
    fn bad_churn_label_is_feature_error() {
        let csv = format!(
            "{HEADER}\n\
             X,Female,0,Yes,No,1,No,No phone service,DSL,No,Yes,No,No,No,No,Month-to-month,Yes,Electronic check,29.85,29.85,Maybe\n"
        );
        let err = Population::from_csv_reader(csv.as_bytes()).unwrap_err();
        assert_eq!(err.code(), "feature_error");
    }

    #[test]
    fn duplicate_customer_id_is_rejected() {
        let csv = format!(
            "{HEADER}\n\
             A,Female,0,Yes,No,1,No,No phone service,DSL,No,Yes,No,No,No,No,Month-to-month,Yes,Electronic check,29.85,29.85,Yes\n\
             A,Male,0,No,No,2,Yes,No,DSL,Yes,Yes,No,No,No,No,Month-to-month,Yes,Mailed check,53.85,108.15,No\n"
        );
        match Population::from_csv_reader(csv.as_bytes()) {
            Err(ChurnError::Feature { field, value, .. }) => {
                assert_eq!(field, "customerID");
                assert_eq!(value, "A");
            }
            other => panic!("expected duplicate id error, got {other:?}"),
        }
    }

    #[test]
    fn missing_column_is_rejected() {
        let csv = "customerID,gender,Churn\nA,Male,No\n";
        assert!(Population::from_csv_reader(csv.as_bytes()).is_err());
    }
}

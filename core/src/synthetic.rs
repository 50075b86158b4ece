//! Seeded synthetic telco population.
//!
//! Attributes are drawn with marginals close to the public telco churn
//! export. Each customer's churn label is a Bernoulli draw on the
//! ensemble's own probability for that customer, so the generated
//! population exhibits the associations the model encodes.
//!
//! RULE: The same (n, seed, bundle) always yields the same Population.

use crate::{
    customer::{
        AddOn, Contract, CustomerRecord, Gender, InternetService, LabeledCustomer, MultipleLines,
        PaymentMethod, YesNo,
    },
    ensemble::EnsembleScorer,
    error::ChurnResult,
    features::FeatureDeriver,
    model::ModelBundle,
    population::Population,
    rng::{PopulationRng, Stream},
};

/// Probability that each add-on is taken, when internet is present.
/// Order matches `CustomerRecord::add_ons()`.
const ADD_ON_RATES: [f64; 6] = [0.37, 0.44, 0.44, 0.37, 0.50, 0.50];
const ADD_ON_PRICE: f64 = 5.0;

pub struct SyntheticPopulation;

impl SyntheticPopulation {
    pub fn generate(n: usize, seed: u64, bundle: &ModelBundle) -> ChurnResult<Population> {
        let mut attrs = PopulationRng::new(seed, Stream::Attributes);
        let mut labels = PopulationRng::new(seed, Stream::Labels);

        let mut customers = Vec::with_capacity(n);
        for i in 0..n {
            let record = sample_record(&mut attrs);
            let vector = FeatureDeriver::derive(&record, &bundle.normalization);
            let p = EnsembleScorer::score(&vector, bundle)?;
            customers.push(LabeledCustomer {
                customer_id: format!("SYN-{seed}-{i:05}"),
                record,
                churned: labels.chance(p),
            });
        }

        let population = Population::new(customers);
        log::info!(
            "generated {} synthetic customers (seed {seed}, {} churned)",
            population.len(),
            population.churned_count()
        );
        Ok(population)
    }
}

fn yes_no(rng: &mut PopulationRng, p: f64) -> YesNo {
    if rng.chance(p) { YesNo::Yes } else { YesNo::No }
}

fn sample_record(rng: &mut PopulationRng) -> CustomerRecord {
    let gender = if rng.chance(0.5) { Gender::Male } else { Gender::Female };
    let senior_citizen = rng.chance(0.16);
    let partner = yes_no(rng, 0.48);
    let dependents = yes_no(rng, if partner.is_yes() { 0.50 } else { 0.10 });

    let contract = rng
        .pick(&[
            (Contract::MonthToMonth, 0.55),
            (Contract::OneYear,      0.21),
            (Contract::TwoYear,      0.24),
        ])
        .unwrap_or(Contract::MonthToMonth);

    // Long contracts skew toward long tenure.
    let tenure = match contract {
        Contract::MonthToMonth => (rng.next_f64().powi(2) * 60.0) as u32,
        Contract::OneYear      => rng.range_u32(6, 72),
        Contract::TwoYear      => rng.range_u32(12, 72),
    };

    let phone_service = yes_no(rng, 0.90);
    let multiple_lines = if phone_service.is_yes() {
        if rng.chance(0.47) { MultipleLines::Yes } else { MultipleLines::No }
    } else {
        MultipleLines::NoPhoneService
    };

    let internet_service = rng
        .pick(&[
            (InternetService::Dsl,        0.34),
            (InternetService::FiberOptic, 0.44),
            (InternetService::No,         0.22),
        ])
        .unwrap_or(InternetService::Dsl);

    let mut add_ons = [AddOn::NoInternetService; 6];
    if internet_service != InternetService::No {
        for (slot, rate) in add_ons.iter_mut().zip(ADD_ON_RATES) {
            *slot = if rng.chance(rate) { AddOn::Yes } else { AddOn::No };
        }
    }

    let payment_method = rng
        .pick(&[
            (PaymentMethod::ElectronicCheck, 0.34),
            (PaymentMethod::MailedCheck,     0.23),
            (PaymentMethod::BankTransfer,    0.22),
            (PaymentMethod::CreditCard,      0.21),
        ])
        .unwrap_or(PaymentMethod::MailedCheck);

    let mut monthly = 18.25;
    if phone_service.is_yes() {
        monthly += 2.0;
    }
    if multiple_lines == MultipleLines::Yes {
        monthly += 5.0;
    }
    monthly += match internet_service {
        InternetService::Dsl        => 25.0,
        InternetService::FiberOptic => 50.0,
        InternetService::No         => 0.0,
    };
    monthly += add_ons.iter().filter(|a| a.is_yes()).count() as f64 * ADD_ON_PRICE;
    monthly += rng.uniform(0.0, 4.0);
    let monthly_charges = (monthly * 100.0).round() / 100.0;

    let total_charges = if tenure == 0 {
        0.0
    } else {
        let t = monthly_charges * f64::from(tenure) * rng.uniform(0.95, 1.05);
        (t * 100.0).round() / 100.0
    };

    let [online_security, online_backup, device_protection, tech_support, streaming_tv, streaming_movies] =
        add_ons;

    CustomerRecord {
        gender,
        senior_citizen,
        partner,
        dependents,
        tenure,
        phone_service,
        multiple_lines,
        internet_service,
        online_security,
        online_backup,
        device_protection,
        tech_support,
        streaming_tv,
        streaming_movies,
        contract,
        paperless_billing: yes_no(rng, 0.59),
        payment_method,
        monthly_charges,
        total_charges,
    }
}

//! Purchase pricing for an inspected and weighed lot.
//!
//! All products are computed in `i128` over paise and grams and rounded half
//! away from zero once per derived amount.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::stage::{FinancialTerms, RateBasis, SuteBasis};
use crate::domain::units::{div_round, Money, Weight, GRAMS_PER_QUINTAL, GRAMS_PER_TON};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error("net weight must be greater than zero")]
    NoNetWeight,
    #[error("bag count must be greater than zero")]
    NoBags,
    #[error("sute deduction {sute} leaves no billable weight from {net}")]
    SuteExceedsNet { net: Weight, sute: Weight },
    #[error("pricing amount overflowed")]
    Overflow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingInput<'a> {
    pub net_weight: Weight,
    pub bags: u32,
    pub terms: &'a FinancialTerms,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingBreakdown {
    pub net_weight: Weight,
    pub bags: u32,
    pub sute_weight: Weight,
    pub billable_weight: Weight,
    pub base_amount: Money,
    pub brokerage_amount: Money,
    pub egb_amount: Money,
    pub lf_amount: Money,
    pub hamali_amount: Money,
    pub party_payable: Money,
    pub broker_payable: Money,
    pub total_purchase_cost: Money,
    pub average_rate_per_quintal: Money,
}

fn narrow(value: i128) -> Result<i64, PricingError> {
    i64::try_from(value).map_err(|_| PricingError::Overflow)
}

fn per_bag(rate: Money, bags: u32) -> Result<Money, PricingError> {
    narrow(i128::from(rate.raw()) * i128::from(bags)).map(Money)
}

fn per_quintal(rate: Money, weight: Weight) -> Result<Money, PricingError> {
    let product = i128::from(rate.raw()) * i128::from(weight.grams());
    narrow(div_round(product, i128::from(GRAMS_PER_QUINTAL))).map(Money)
}

fn rated_amount(
    rate: Money,
    basis: RateBasis,
    weight: Weight,
    bags: u32,
) -> Result<Money, PricingError> {
    match basis {
        RateBasis::PerQuintal => per_quintal(rate, weight),
        RateBasis::PerBag => per_bag(rate, bags),
    }
}

fn sute_weight(terms: &FinancialTerms, net: Weight, bags: u32) -> Result<Weight, PricingError> {
    // sute_rate holds kilograms expressed in grams.
    let grams = match terms.sute_basis {
        SuteBasis::PerTon => div_round(
            i128::from(terms.sute_rate.grams()) * i128::from(net.grams()),
            i128::from(GRAMS_PER_TON),
        ),
        SuteBasis::PerBag => i128::from(terms.sute_rate.grams()) * i128::from(bags),
    };
    narrow(grams).map(Weight)
}

fn sum(amounts: &[Money]) -> Result<Money, PricingError> {
    amounts
        .iter()
        .try_fold(Money(0), |total, amount| total.checked_add(*amount))
        .ok_or(PricingError::Overflow)
}

pub fn calculate(input: &PricingInput<'_>) -> Result<PricingBreakdown, PricingError> {
    if !input.net_weight.is_positive() {
        return Err(PricingError::NoNetWeight);
    }
    if input.bags == 0 {
        return Err(PricingError::NoBags);
    }
    let terms = input.terms;
    let bags = input.bags;

    let sute = sute_weight(terms, input.net_weight, bags)?;
    let billable = Weight(input.net_weight.grams() - sute.grams());
    if !billable.is_positive() {
        return Err(PricingError::SuteExceedsNet {
            net: input.net_weight,
            sute,
        });
    }

    let base_amount = rated_amount(terms.base_rate, terms.base_basis, billable, bags)?;
    let brokerage_amount =
        rated_amount(terms.brokerage_rate, terms.brokerage_basis, billable, bags)?;
    let egb_amount = per_bag(terms.egb_rate, bags)?;
    let lf_amount = per_bag(terms.lf_rate, bags)?;
    let hamali_amount = per_bag(terms.hamali_rate, bags)?;

    let party_payable = sum(&[base_amount, egb_amount])?
        .checked_sub(sum(&[lf_amount, hamali_amount])?)
        .ok_or(PricingError::Overflow)?;
    let total_purchase_cost = sum(&[base_amount, egb_amount, brokerage_amount])?;
    let average_rate_per_quintal = narrow(div_round(
        i128::from(total_purchase_cost.raw()) * i128::from(GRAMS_PER_QUINTAL),
        i128::from(billable.grams()),
    ))
    .map(Money)?;

    Ok(PricingBreakdown {
        net_weight: input.net_weight,
        bags,
        sute_weight: sute,
        billable_weight: billable,
        base_amount,
        brokerage_amount,
        egb_amount,
        lf_amount,
        hamali_amount,
        party_payable,
        broker_payable: brokerage_amount,
        total_purchase_cost,
        average_rate_per_quintal,
    })
}

#[cfg(test)]
mod tests {
    use super::{calculate, PricingError, PricingInput};
    use crate::domain::stage::{FinancialTerms, RateBasis, SuteBasis};
    use crate::domain::units::{Money, Weight};

    fn terms() -> FinancialTerms {
        FinancialTerms {
            base_rate: Money::from_rupees(2_100),
            base_basis: RateBasis::PerQuintal,
            sute_rate: Weight::from_kg(1),
            sute_basis: SuteBasis::PerTon,
            brokerage_rate: Money::from_rupees(10),
            brokerage_basis: RateBasis::PerQuintal,
            egb_rate: Money::from_rupees(15),
            lf_rate: Money::from_rupees(5),
            hamali_rate: Money::from_rupees(4),
        }
    }

    #[test]
    fn per_quintal_terms_produce_party_broker_and_mill_amounts() {
        let terms = terms();
        let breakdown = calculate(&PricingInput {
            net_weight: Weight::from_kg(20_000),
            bags: 400,
            terms: &terms,
        })
        .expect("pricing should succeed");

        // 1 kg per ton on 20 t.
        assert_eq!(breakdown.sute_weight, Weight::from_kg(20));
        assert_eq!(breakdown.billable_weight, Weight::from_kg(19_980));
        // 199.8 q x 2100
        assert_eq!(breakdown.base_amount, Money::from_rupees(419_580));
        assert_eq!(breakdown.brokerage_amount, Money::from_rupees(1_998));
        assert_eq!(breakdown.egb_amount, Money::from_rupees(6_000));
        assert_eq!(breakdown.lf_amount, Money::from_rupees(2_000));
        assert_eq!(breakdown.hamali_amount, Money::from_rupees(1_600));
        assert_eq!(breakdown.party_payable, Money::from_rupees(421_980));
        assert_eq!(breakdown.broker_payable, Money::from_rupees(1_998));
        assert_eq!(breakdown.total_purchase_cost, Money::from_rupees(427_578));
        // 427578 / 199.8 = 2140.03
        assert_eq!(breakdown.average_rate_per_quintal, Money(214_003));
    }

    #[test]
    fn per_bag_basis_ignores_weight_for_base_amount() {
        let terms = FinancialTerms {
            base_rate: Money::from_rupees(1_500),
            base_basis: RateBasis::PerBag,
            sute_rate: Weight(500),
            sute_basis: SuteBasis::PerBag,
            brokerage_rate: Money::from_rupees(2),
            brokerage_basis: RateBasis::PerBag,
            egb_rate: Money(0),
            lf_rate: Money(0),
            hamali_rate: Money(0),
        };
        let breakdown = calculate(&PricingInput {
            net_weight: Weight::from_kg(7_500),
            bags: 100,
            terms: &terms,
        })
        .expect("pricing should succeed");
        assert_eq!(breakdown.sute_weight, Weight::from_kg(50));
        assert_eq!(breakdown.base_amount, Money::from_rupees(150_000));
        assert_eq!(breakdown.brokerage_amount, Money::from_rupees(200));
        assert_eq!(breakdown.party_payable, Money::from_rupees(150_000));
    }

    #[test]
    fn rounds_fractional_paise_half_away_from_zero() {
        let terms = FinancialTerms {
            base_rate: Money(210_001),
            sute_rate: Weight(0),
            ..terms()
        };
        let breakdown = calculate(&PricingInput {
            net_weight: Weight(50_500),
            bags: 1,
            terms: &terms,
        })
        .expect("pricing should succeed");
        // 210001 paise x 0.505 q = 106050.505 paise
        assert_eq!(breakdown.base_amount, Money(106_051));
    }

    #[test]
    fn rejects_degenerate_inputs() {
        let terms = terms();
        assert_eq!(
            calculate(&PricingInput {
                net_weight: Weight(0),
                bags: 10,
                terms: &terms,
            }),
            Err(PricingError::NoNetWeight)
        );
        assert_eq!(
            calculate(&PricingInput {
                net_weight: Weight::from_kg(10),
                bags: 0,
                terms: &terms,
            }),
            Err(PricingError::NoBags)
        );

        let heavy_sute = FinancialTerms {
            sute_rate: Weight::from_kg(2),
            sute_basis: SuteBasis::PerBag,
            ..terms
        };
        assert!(matches!(
            calculate(&PricingInput {
                net_weight: Weight::from_kg(10),
                bags: 5,
                terms: &heavy_sute,
            }),
            Err(PricingError::SuteExceedsNet { .. })
        ));
    }
}

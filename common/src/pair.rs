//! Rate pairs and ordered, deduplicated pair lists.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::currency::Currency;
use crate::error::{Result, ValidationError};

/// Fractional digits kept for every stored rate value.
pub const VALUE_DECIMALS: u32 = 5;

/// Identity of a pair: `(base, quote)`.
pub type PairKey = (Currency, Currency);

/// Round a rate to the stored precision.
pub fn round_rate(value: Decimal) -> Decimal {
    value.round_dp(VALUE_DECIMALS)
}

/// A value that can be assigned to a rate pair.
///
/// Integers are coerced, floats must be finite and strings must parse as a number.
pub trait IntoRateValue {
    fn into_rate_value(self) -> Result<Decimal>;
}

impl IntoRateValue for Decimal {
    fn into_rate_value(self) -> Result<Decimal> {
        Ok(self)
    }
}

impl IntoRateValue for f64 {
    fn into_rate_value(self) -> Result<Decimal> {
        if !self.is_finite() {
            return Err(ValidationError::InvalidValue(self.to_string()));
        }
        Decimal::try_from(self).map_err(|e| ValidationError::InvalidValue(e.to_string()))
    }
}

impl IntoRateValue for i64 {
    fn into_rate_value(self) -> Result<Decimal> {
        Ok(Decimal::from(self))
    }
}

impl IntoRateValue for i32 {
    fn into_rate_value(self) -> Result<Decimal> {
        Ok(Decimal::from(self))
    }
}

impl IntoRateValue for &str {
    fn into_rate_value(self) -> Result<Decimal> {
        self.trim()
            .parse::<Decimal>()
            .map_err(|_| ValidationError::InvalidValue(self.to_string()))
    }
}

/// A single currency pair quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatePair {
    base: Currency,
    quote: Currency,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_rounded"
    )]
    value: Option<Decimal>,
}

fn deserialize_rounded<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<Decimal>, D::Error> {
    Ok(Option::<Decimal>::deserialize(deserializer)?.map(round_rate))
}

impl RatePair {
    /// Create a valueless pair from two currency codes.
    pub fn new(base: &str, quote: &str) -> Result<Self> {
        Ok(Self::from_currencies(Currency::new(base)?, Currency::new(quote)?))
    }

    /// Create a valueless pair from validated currencies.
    pub fn from_currencies(base: Currency, quote: Currency) -> Self {
        Self {
            base,
            quote,
            value: None,
        }
    }

    /// Builder-style value assignment.
    pub fn with_value<V: IntoRateValue>(mut self, value: V) -> Result<Self> {
        self.set_value(value)?;
        Ok(self)
    }

    pub fn base(&self) -> Currency {
        self.base
    }

    pub fn quote(&self) -> Currency {
        self.quote
    }

    pub fn key(&self) -> PairKey {
        (self.base, self.quote)
    }

    pub fn value(&self) -> Option<Decimal> {
        self.value
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    /// Assign a value, rounded to [`VALUE_DECIMALS`] places.
    pub fn set_value<V: IntoRateValue>(&mut self, value: V) -> Result<()> {
        self.value = Some(round_rate(value.into_rate_value()?));
        Ok(())
    }

    pub fn clear_value(&mut self) {
        self.value = None;
    }

    /// Copy of this pair without its value.
    pub fn without_value(&self) -> Self {
        Self::from_currencies(self.base, self.quote)
    }

    /// Overlay another pair with the same key onto this one.
    ///
    /// Fields present on `other` win; a valueless `other` keeps the current value.
    fn overlay(&mut self, other: RatePair) {
        if other.value.is_some() {
            self.value = other.value;
        }
    }

    /// Fail unless this pair carries a value.
    pub fn ensure_value(&self) -> Result<Decimal> {
        self.value.ok_or(ValidationError::MissingValue {
            base: self.base,
            quote: self.quote,
        })
    }
}

impl fmt::Display for RatePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)?;
        if let Some(value) = self.value {
            write!(f, "/{}", value)?;
        }
        Ok(())
    }
}

/// Ordered list of pairs, unique by `(base, quote)`.
///
/// Inserting an existing key overwrites that entry in place; new keys are appended.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<RatePair>", into = "Vec<RatePair>")]
pub struct PairList {
    pairs: Vec<RatePair>,
    index: HashMap<PairKey, usize>,
}

impl PairList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update a pair. Returns `true` when the key was new.
    pub fn insert(&mut self, pair: RatePair) -> bool {
        match self.index.get(&pair.key()) {
            Some(&position) => {
                self.pairs[position].overlay(pair);
                false
            }
            None => {
                self.index.insert(pair.key(), self.pairs.len());
                self.pairs.push(pair);
                true
            }
        }
    }

    pub fn get(&self, base: Currency, quote: Currency) -> Option<&RatePair> {
        self.index.get(&(base, quote)).map(|&i| &self.pairs[i])
    }

    pub fn get_mut(&mut self, base: Currency, quote: Currency) -> Option<&mut RatePair> {
        match self.index.get(&(base, quote)) {
            Some(&i) => Some(&mut self.pairs[i]),
            None => None,
        }
    }

    pub fn contains(&self, key: &PairKey) -> bool {
        self.index.contains_key(key)
    }

    /// Remove a pair, keeping the order of the remaining ones.
    pub fn remove(&mut self, key: &PairKey) -> Option<RatePair> {
        let position = self.index.remove(key)?;
        let removed = self.pairs.remove(position);
        for slot in self.index.values_mut() {
            if *slot > position {
                *slot -= 1;
            }
        }
        Some(removed)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RatePair> {
        self.pairs.iter()
    }

    /// Mutable access to the pairs. Keys cannot change through this.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, RatePair> {
        self.pairs.iter_mut()
    }

    pub fn keys(&self) -> impl Iterator<Item = PairKey> + '_ {
        self.pairs.iter().map(RatePair::key)
    }

    /// First pair lacking a value, if any.
    pub fn first_missing_value(&self) -> Option<&RatePair> {
        self.pairs.iter().find(|p| !p.has_value())
    }

    pub fn as_slice(&self) -> &[RatePair] {
        &self.pairs
    }

    pub fn into_vec(self) -> Vec<RatePair> {
        self.pairs
    }
}

impl PartialEq for PairList {
    fn eq(&self, other: &Self) -> bool {
        self.pairs == other.pairs
    }
}

impl Eq for PairList {}

impl From<Vec<RatePair>> for PairList {
    fn from(pairs: Vec<RatePair>) -> Self {
        pairs.into_iter().collect()
    }
}

impl From<PairList> for Vec<RatePair> {
    fn from(list: PairList) -> Self {
        list.pairs
    }
}

impl FromIterator<RatePair> for PairList {
    fn from_iter<I: IntoIterator<Item = RatePair>>(iter: I) -> Self {
        let mut list = PairList::new();
        list.extend(iter);
        list
    }
}

impl Extend<RatePair> for PairList {
    fn extend<I: IntoIterator<Item = RatePair>>(&mut self, iter: I) {
        for pair in iter {
            self.insert(pair);
        }
    }
}

impl IntoIterator for PairList {
    type Item = RatePair;
    type IntoIter = std::vec::IntoIter<RatePair>;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.into_iter()
    }
}

impl<'a> IntoIterator for &'a PairList {
    type Item = &'a RatePair;
    type IntoIter = std::slice::Iter<'a, RatePair>;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.iter()
    }
}

/// Full cross product of the supported currencies, self-pairs excluded.
pub fn default_pairs() -> PairList {
    let all: Vec<Currency> = Currency::all().collect();
    custom_pairs(&all)
}

/// Cross product of `currencies`, base-major in input order, self-pairs excluded.
pub fn custom_pairs(currencies: &[Currency]) -> PairList {
    currencies
        .iter()
        .flat_map(|&base| {
            currencies
                .iter()
                .filter(move |&&quote| quote != base)
                .map(move |&quote| RatePair::from_currencies(base, quote))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::SUPPORTED_CURRENCIES;
    use rust_decimal_macros::dec;

    fn pair(base: &str, quote: &str, value: Decimal) -> RatePair {
        RatePair::new(base, quote).unwrap().with_value(value).unwrap()
    }

    #[test]
    fn test_value_rounded_to_five_places() {
        let p = pair("USD", "EUR", dec!(1.234567));
        assert_eq!(p.value(), Some(dec!(1.23457)));
    }

    #[test]
    fn test_integer_and_float_values() {
        let mut p = RatePair::new("USD", "EUR").unwrap();
        p.set_value(2i64).unwrap();
        assert_eq!(p.value(), Some(dec!(2)));

        p.set_value(0.123456789f64).unwrap();
        assert_eq!(p.value(), Some(dec!(0.12346)));
    }

    #[test]
    fn test_non_numeric_value_rejected() {
        let mut p = RatePair::new("USD", "EUR").unwrap();
        assert!(matches!(p.set_value("abc"), Err(ValidationError::InvalidValue(_))));
        assert!(matches!(p.set_value(f64::NAN), Err(ValidationError::InvalidValue(_))));
        assert!(p.value().is_none());
    }

    #[test]
    fn test_unsupported_currency_rejected() {
        assert!(matches!(
            RatePair::new("USD", "XYZ"),
            Err(ValidationError::UnsupportedCurrency(_))
        ));
    }

    #[test]
    fn test_pair_list_overwrites_in_place() {
        let mut list = PairList::new();
        assert!(list.insert(pair("USD", "EUR", dec!(0.9))));
        assert!(list.insert(pair("USD", "GBP", dec!(0.8))));
        assert!(!list.insert(pair("USD", "EUR", dec!(0.95))));

        let keys: Vec<_> = list.keys().collect();
        assert_eq!(keys, vec![(Currency::USD, Currency::EUR), (Currency::USD, Currency::GBP)]);
        assert_eq!(list.get(Currency::USD, Currency::EUR).unwrap().value(), Some(dec!(0.95)));
    }

    #[test]
    fn test_valueless_insert_keeps_value() {
        let mut list = PairList::new();
        list.insert(pair("USD", "EUR", dec!(0.9)));
        list.insert(RatePair::new("USD", "EUR").unwrap());
        assert_eq!(list.get(Currency::USD, Currency::EUR).unwrap().value(), Some(dec!(0.9)));
    }

    #[test]
    fn test_remove_reindexes() {
        let mut list: PairList = vec![
            pair("USD", "EUR", dec!(1)),
            pair("USD", "GBP", dec!(2)),
            pair("EUR", "GBP", dec!(3)),
        ]
        .into();

        list.remove(&(Currency::USD, Currency::EUR)).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.get(Currency::EUR, Currency::GBP).unwrap().value(), Some(dec!(3)));
        assert!(list.insert(pair("USD", "EUR", dec!(4))));
        assert_eq!(list.as_slice()[2].key(), (Currency::USD, Currency::EUR));
    }

    #[test]
    fn test_default_pairs() {
        let pairs = default_pairs();
        let n = SUPPORTED_CURRENCIES.len();
        assert_eq!(pairs.len(), n * (n - 1));
        assert!(pairs.iter().all(|p| p.base() != p.quote()));
        assert_eq!(pairs.as_slice()[0].key(), (Currency::USD, Currency::EUR));
    }

    #[test]
    fn test_custom_pairs_order() {
        let currencies = Currency::parse_list("GBP,USD,EUR").unwrap();
        let keys: Vec<String> = custom_pairs(&currencies)
            .iter()
            .map(|p| p.to_string())
            .collect();
        assert_eq!(
            keys,
            vec!["GBP/USD", "GBP/EUR", "USD/GBP", "USD/EUR", "EUR/GBP", "EUR/USD"]
        );
    }

    #[test]
    fn test_deserialize_rounds_value() {
        let p: RatePair =
            serde_json::from_str(r#"{"base":"USD","quote":"EUR","value":0.9123456}"#).unwrap();
        assert_eq!(p.value(), Some(dec!(0.91235)));
    }
}

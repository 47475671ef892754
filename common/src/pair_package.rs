//! Pair packages: every pair requested or known for one exchange date.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::currency::Currency;
use crate::error::Result;
use crate::pair::{custom_pairs, default_pairs, PairList, RatePair};
use crate::time::{self, IntoExchangeDate, Timestamp};

/// Pairs for a single exchange date.
///
/// The exchange date is the storage key and always represents midnight of that day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairPackage {
    #[serde(with = "crate::time::midnight_timestamp")]
    exchange_date: NaiveDate,
    #[serde(default)]
    pairs: PairList,
}

impl PairPackage {
    /// Create an empty package. Accepts a date, a datetime or a date string.
    pub fn new<D: IntoExchangeDate>(exchange_date: D) -> Result<Self> {
        Ok(Self::for_date(exchange_date.into_exchange_date()?))
    }

    /// Create an empty package for a calendar day.
    pub fn for_date(exchange_date: NaiveDate) -> Self {
        Self {
            exchange_date,
            pairs: PairList::new(),
        }
    }

    /// Package holding the full default currency matrix.
    pub fn with_default_pairs(exchange_date: NaiveDate) -> Self {
        Self::for_date(exchange_date).with_pairs(default_pairs())
    }

    /// Package holding the cross product of `currencies`.
    pub fn with_custom_pairs(exchange_date: NaiveDate, currencies: &[Currency]) -> Self {
        Self::for_date(exchange_date).with_pairs(custom_pairs(currencies))
    }

    pub fn with_pairs(mut self, pairs: impl Into<PairList>) -> Self {
        self.pairs = pairs.into();
        self
    }

    pub fn exchange_date(&self) -> NaiveDate {
        self.exchange_date
    }

    /// Exchange date as its midnight timestamp.
    pub fn exchange_datetime(&self) -> Timestamp {
        time::midnight(self.exchange_date)
    }

    /// Exchange date formatted as `YYYY-MM-DD`.
    pub fn exchange_date_str(&self) -> String {
        self.exchange_date.format("%Y-%m-%d").to_string()
    }

    pub fn set_exchange_date<D: IntoExchangeDate>(&mut self, exchange_date: D) -> Result<()> {
        self.exchange_date = exchange_date.into_exchange_date()?;
        Ok(())
    }

    pub fn pairs(&self) -> &PairList {
        &self.pairs
    }

    pub fn pairs_mut(&mut self) -> &mut PairList {
        &mut self.pairs
    }

    pub fn set_pairs(&mut self, pairs: impl Into<PairList>) {
        self.pairs = pairs.into();
    }

    pub fn insert_pair(&mut self, pair: RatePair) -> bool {
        self.pairs.insert(pair)
    }

    pub fn into_pairs(self) -> PairList {
        self.pairs
    }

    /// Smallest currency set covering every base and quote.
    pub fn currencies(&self) -> BTreeSet<Currency> {
        self.pairs
            .iter()
            .flat_map(|p| [p.base(), p.quote()])
            .collect()
    }

    /// Same date and keys, without values.
    pub fn without_values(&self) -> Self {
        Self {
            exchange_date: self.exchange_date,
            pairs: self.pairs.iter().map(RatePair::without_value).collect(),
        }
    }

    /// Fail if any pair is lacking a value.
    pub fn ensure_values(&self) -> Result<()> {
        match self.pairs.first_missing_value() {
            Some(pair) => pair.ensure_value().map(|_| ()),
            None => Ok(()),
        }
    }
}

impl fmt::Display for PairPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [", self.exchange_date_str())?;
        for (i, pair) in self.pairs.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", pair)?;
        }
        f.write_str("]")
    }
}

/// Ordered list of packages, unique by exchange date.
///
/// Pushing a package for a date already present merges its pairs into the
/// existing package.
#[derive(Debug, Clone, Default)]
pub struct PairPackageList {
    packages: Vec<PairPackage>,
    index: HashMap<NaiveDate, usize>,
}

impl PairPackageList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, package: PairPackage) {
        match self.index.get(&package.exchange_date) {
            Some(&position) => {
                self.packages[position]
                    .pairs
                    .extend(package.pairs.into_iter());
            }
            None => {
                self.index.insert(package.exchange_date, self.packages.len());
                self.packages.push(package);
            }
        }
    }

    pub fn get(&self, exchange_date: NaiveDate) -> Option<&PairPackage> {
        self.index.get(&exchange_date).map(|&i| &self.packages[i])
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PairPackage> {
        self.packages.iter()
    }
}

impl FromIterator<PairPackage> for PairPackageList {
    fn from_iter<I: IntoIterator<Item = PairPackage>>(iter: I) -> Self {
        let mut list = PairPackageList::new();
        for package in iter {
            list.push(package);
        }
        list
    }
}

impl IntoIterator for PairPackageList {
    type Item = PairPackage;
    type IntoIter = std::vec::IntoIter<PairPackage>;

    fn into_iter(self) -> Self::IntoIter {
        self.packages.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use chrono::{NaiveDateTime, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_exchange_date_normalized() {
        let from_str = PairPackage::new("2023-01-10T15:30:00Z").unwrap();
        let from_dt = PairPackage::new(Utc.with_ymd_and_hms(2023, 1, 10, 23, 0, 0).unwrap()).unwrap();
        let naive = NaiveDateTime::parse_from_str("2023-01-10 07:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let from_naive = PairPackage::new(naive).unwrap();

        assert_eq!(from_str.exchange_date(), date(2023, 1, 10));
        assert_eq!(from_dt.exchange_date(), date(2023, 1, 10));
        assert_eq!(from_naive.exchange_date(), date(2023, 1, 10));
        assert_eq!(from_str.exchange_datetime().to_rfc3339(), "2023-01-10T00:00:00+00:00");
    }

    #[test]
    fn test_invalid_date_string() {
        assert!(matches!(
            PairPackage::new("not a date"),
            Err(ValidationError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_currencies_union() {
        let package = PairPackage::for_date(date(2023, 1, 1)).with_pairs(vec![
            RatePair::new("USD", "EUR").unwrap(),
            RatePair::new("GBP", "EUR").unwrap(),
        ]);
        let codes: Vec<&str> = package.currencies().iter().map(|c| c.code()).collect();
        assert_eq!(codes, vec!["EUR", "GBP", "USD"]);
    }

    #[test]
    fn test_ensure_values() {
        let mut package = PairPackage::with_custom_pairs(
            date(2023, 1, 1),
            &[Currency::USD, Currency::EUR],
        );
        assert!(matches!(
            package.ensure_values(),
            Err(ValidationError::MissingValue { .. })
        ));
        for pair in package.pairs_mut().iter_mut() {
            pair.set_value(dec!(1.1)).unwrap();
        }
        assert!(package.ensure_values().is_ok());
    }

    #[test]
    fn test_display() {
        let package = PairPackage::for_date(date(2020, 12, 1)).with_pairs(vec![
            RatePair::new("USD", "EUR").unwrap().with_value(dec!(0.9)).unwrap(),
            RatePair::new("EUR", "USD").unwrap(),
        ]);
        assert_eq!(package.to_string(), "2020-12-01 [USD/EUR/0.9,EUR/USD]");
    }

    #[test]
    fn test_serde_document_shape() {
        let package = PairPackage::for_date(date(2023, 1, 10)).with_pairs(vec![RatePair::new(
            "USD", "EUR",
        )
        .unwrap()
        .with_value(dec!(0.91))
        .unwrap()]);

        let json = serde_json::to_value(&package).unwrap();
        assert_eq!(json["exchangeDate"], "2023-01-10T00:00:00+00:00");
        assert_eq!(json["pairs"][0]["base"], "USD");

        let back: PairPackage = serde_json::from_value(json).unwrap();
        assert_eq!(back, package);
    }

    #[test]
    fn test_package_list_merges_same_date() {
        let d = date(2023, 1, 10);
        let first = PairPackage::for_date(d).with_pairs(vec![
            RatePair::new("USD", "EUR").unwrap().with_value(dec!(0.9)).unwrap(),
        ]);
        let second = PairPackage::for_date(d).with_pairs(vec![
            RatePair::new("USD", "EUR").unwrap().with_value(dec!(0.95)).unwrap(),
            RatePair::new("USD", "GBP").unwrap(),
        ]);
        let other_day = PairPackage::for_date(date(2023, 1, 11));

        let list: PairPackageList = vec![first, second, other_day].into_iter().collect();

        assert_eq!(list.len(), 2);
        let merged = list.get(d).unwrap();
        assert_eq!(merged.pairs().len(), 2);
        assert_eq!(
            merged.pairs().get(Currency::USD, Currency::EUR).unwrap().value(),
            Some(dec!(0.95))
        );
    }
}

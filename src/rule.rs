use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Largest live-neighbor count a 3x3x3 neighborhood can produce.
pub const MAX_NEIGHBORS: u32 = 26;
pub const DEFAULT_STATE_COUNT: u32 = 2;
pub const MAX_STATE_COUNT: u32 = 255;

const NEIGHBOR_COUNTS: u32 = MAX_NEIGHBORS + 1;
const SET_MASK: u64 = (1 << NEIGHBOR_COUNTS) - 1;
const SURVIVE_SHIFT: u32 = NEIGHBOR_COUNTS;
const STATE_COUNT_SHIFT: u32 = NEIGHBOR_COUNTS * 2;
const STATE_COUNT_MASK: u64 = 0x1ff;
const VALID_BIT: u64 = 1 << 63;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("rule `{0}` has no `/` separating the birth and survival sections")]
    MissingSeparator(String),
    #[error("section `{section}` must start with `{expected}`")]
    InvalidSectionPrefix { section: String, expected: char },
    #[error("neighbor count `{token}` is not an integer in 0..=26")]
    MalformedNeighborList { token: String },
    #[error("state count `{token}` is not an integer in 2..=255")]
    MalformedStateCount { token: String },
}

/// A birth/survival/refractory rule packed into a single word.
///
/// Bits 0..27 hold the birth set, bits 27..54 the survival set, bits 54..63 the
/// state count and bit 63 marks the rule as set. The packed word is what the GPU
/// kernel receives, so it is kept as the canonical representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RuleSpec(u64);

impl RuleSpec {
    pub const UNDEFINED: RuleSpec = RuleSpec(0);

    pub fn parse(rule: &str) -> Result<Self, RuleError> {
        let rule: String = rule
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect();

        let (birth, rest) = rule
            .split_once('/')
            .ok_or_else(|| RuleError::MissingSeparator(rule.clone()))?;

        // A second slash is optional; an empty count falls back to the default.
        let (survive, count) = match rest.split_once('/') {
            Some((survive, count)) => (survive, count),
            None => (rest, ""),
        };

        let birth = strip_section(birth, 'B')?;
        let survive = strip_section(survive, 'S')?;

        let birth = parse_neighbor_list(birth)?;
        let survive = parse_neighbor_list(survive)?;
        let state_count = parse_state_count(count)?;

        Ok(Self::pack(birth, survive, state_count))
    }

    /// Builds a rule from explicit sets, validating them the same way `parse` does.
    pub fn from_parts<B, S>(birth: B, survive: S, state_count: u32) -> Result<Self, RuleError>
    where
        B: IntoIterator<Item = u32>,
        S: IntoIterator<Item = u32>,
    {
        let birth = neighbor_set(birth)?;
        let survive = neighbor_set(survive)?;
        if !(DEFAULT_STATE_COUNT..=MAX_STATE_COUNT).contains(&state_count) {
            return Err(RuleError::MalformedStateCount {
                token: state_count.to_string(),
            });
        }
        Ok(Self::pack(birth, survive, state_count))
    }

    fn pack(birth: u64, survive: u64, state_count: u32) -> Self {
        Self(
            birth
                | (survive << SURVIVE_SHIFT)
                | ((state_count as u64) << STATE_COUNT_SHIFT)
                | VALID_BIT,
        )
    }

    pub fn bits(&self) -> u64 {
        self.0
    }

    pub fn is_defined(&self) -> bool {
        self.0 & VALID_BIT != 0
    }

    pub fn born(&self, live_neighbors: u32) -> bool {
        live_neighbors <= MAX_NEIGHBORS && (self.0 >> live_neighbors) & 1 == 1
    }

    pub fn survives(&self, live_neighbors: u32) -> bool {
        live_neighbors <= MAX_NEIGHBORS && (self.0 >> (live_neighbors + SURVIVE_SHIFT)) & 1 == 1
    }

    pub fn state_count(&self) -> u32 {
        ((self.0 >> STATE_COUNT_SHIFT) & STATE_COUNT_MASK) as u32
    }

    /// State an alive cell enters when it fails to survive.
    pub fn dying_state(&self) -> u32 {
        match self.state_count() {
            count if count > 2 => count - 1,
            _ => 0,
        }
    }

    pub fn birth_counts(&self) -> impl Iterator<Item = u32> + '_ {
        (0..=MAX_NEIGHBORS).filter(move |&n| self.born(n))
    }

    pub fn survive_counts(&self) -> impl Iterator<Item = u32> + '_ {
        (0..=MAX_NEIGHBORS).filter(move |&n| self.survives(n))
    }
}

impl Default for RuleSpec {
    fn default() -> Self {
        Self::UNDEFINED
    }
}

impl FromStr for RuleSpec {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RuleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_defined() {
            return write!(f, "UndefinedRule");
        }

        let join = |counts: Vec<u32>| {
            counts
                .iter()
                .map(|n| n.to_string())
                .collect::<Vec<_>>()
                .join(",")
        };

        write!(
            f,
            "B {} / S {}",
            join(self.birth_counts().collect()),
            join(self.survive_counts().collect())
        )?;
        if self.state_count() != DEFAULT_STATE_COUNT {
            write!(f, " / {}", self.state_count())?;
        }
        Ok(())
    }
}

fn strip_section(section: &str, prefix: char) -> Result<&str, RuleError> {
    section
        .strip_prefix(prefix)
        .ok_or_else(|| RuleError::InvalidSectionPrefix {
            section: section.to_string(),
            expected: prefix,
        })
}

fn parse_number(token: &str) -> Option<u32> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

fn parse_neighbor_list(list: &str) -> Result<u64, RuleError> {
    list.split(',').try_fold(0u64, |set, token| {
        match parse_number(token) {
            Some(n) if n <= MAX_NEIGHBORS => Ok(set | (1 << n)),
            _ => Err(RuleError::MalformedNeighborList {
                token: token.to_string(),
            }),
        }
    })
}

fn parse_state_count(token: &str) -> Result<u32, RuleError> {
    if token.is_empty() {
        return Ok(DEFAULT_STATE_COUNT);
    }
    match parse_number(token) {
        Some(n) if (DEFAULT_STATE_COUNT..=MAX_STATE_COUNT).contains(&n) => Ok(n),
        _ => Err(RuleError::MalformedStateCount {
            token: token.to_string(),
        }),
    }
}

fn neighbor_set<I: IntoIterator<Item = u32>>(counts: I) -> Result<u64, RuleError> {
    let mut set = 0u64;
    for n in counts {
        if n > MAX_NEIGHBORS {
            return Err(RuleError::MalformedNeighborList {
                token: n.to_string(),
            });
        }
        set |= 1 << n;
    }
    // An empty list has no textual form, so reject it here too.
    if set & SET_MASK == 0 {
        return Err(RuleError::MalformedNeighborList {
            token: String::new(),
        });
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(iter: impl Iterator<Item = u32>) -> Vec<u32> {
        iter.collect()
    }

    #[test]
    fn parses_two_state_rule() {
        let rule = RuleSpec::parse("B3/S2,3").unwrap();
        assert_eq!(counts(rule.birth_counts()), vec![3]);
        assert_eq!(counts(rule.survive_counts()), vec![2, 3]);
        assert_eq!(rule.state_count(), 2);
        assert!(rule.is_defined());
    }

    #[test]
    fn parses_state_count() {
        let rule = RuleSpec::parse("B3/S2,3/5").unwrap();
        assert_eq!(rule.state_count(), 5);
        assert_eq!(rule.dying_state(), 4);
    }

    #[test]
    fn parse_is_case_and_whitespace_insensitive() {
        let upper = RuleSpec::parse("B3/S2,3").unwrap();
        assert_eq!(RuleSpec::parse("b3/s2,3").unwrap(), upper);
        assert_eq!(RuleSpec::parse("  b 3 / s 2 , 3 ").unwrap(), upper);
    }

    #[test]
    fn empty_count_after_second_slash_defaults() {
        let rule = RuleSpec::parse("B4/S4/").unwrap();
        assert_eq!(rule.state_count(), DEFAULT_STATE_COUNT);
    }

    #[test]
    fn rejects_missing_separator() {
        assert_eq!(
            RuleSpec::parse("B3S2"),
            Err(RuleError::MissingSeparator("B3S2".to_string()))
        );
    }

    #[test]
    fn rejects_bad_prefixes() {
        assert!(matches!(
            RuleSpec::parse("3/S2"),
            Err(RuleError::InvalidSectionPrefix { expected: 'B', .. })
        ));
        assert!(matches!(
            RuleSpec::parse("B3/2"),
            Err(RuleError::InvalidSectionPrefix { expected: 'S', .. })
        ));
        assert!(matches!(
            RuleSpec::parse("/S2"),
            Err(RuleError::InvalidSectionPrefix { expected: 'B', .. })
        ));
    }

    #[test]
    fn rejects_malformed_neighbor_lists() {
        for rule in ["B27/S2", "B/S2", "B3,/S2", "B3/S2,x", "B-1/S2", "B3/S99999999999"] {
            assert!(
                matches!(
                    RuleSpec::parse(rule),
                    Err(RuleError::MalformedNeighborList { .. })
                ),
                "{} should be rejected",
                rule
            );
        }
    }

    #[test]
    fn rejects_malformed_state_counts() {
        for rule in ["B3/S2/1", "B3/S2/256", "B3/S2/0", "B3/S2/x", "B3/S2/5/6"] {
            assert!(
                matches!(
                    RuleSpec::parse(rule),
                    Err(RuleError::MalformedStateCount { .. })
                ),
                "{} should be rejected",
                rule
            );
        }
    }

    #[test]
    fn list_errors_take_priority_over_count_errors() {
        assert!(matches!(
            RuleSpec::parse("B30/S2/1"),
            Err(RuleError::MalformedNeighborList { .. })
        ));
    }

    #[test]
    fn serializes_canonically() {
        let rule = RuleSpec::parse("B 5,4 / S 3,2,3 / 6").unwrap();
        assert_eq!(rule.to_string(), "B 4,5 / S 2,3 / 6");
        assert_eq!(RuleSpec::parse("B3/S2,3").unwrap().to_string(), "B 3 / S 2,3");
        assert_eq!(RuleSpec::UNDEFINED.to_string(), "UndefinedRule");
    }

    #[test]
    fn canonical_form_parses_back() {
        let rule = RuleSpec::parse("B 4,5,10,14,21,25 / S 6,8,12,13,18,25 / 6").unwrap();
        assert_eq!(rule.to_string().parse::<RuleSpec>().unwrap(), rule);
    }

    #[test]
    fn packs_fields_into_documented_bits() {
        let rule = RuleSpec::parse("B0/S26/255").unwrap();
        assert_eq!(rule.bits() & 1, 1);
        assert_eq!((rule.bits() >> (26 + 27)) & 1, 1);
        assert_eq!((rule.bits() >> 54) & 0x1ff, 255);
        assert_eq!(rule.bits() >> 63, 1);
    }

    #[test]
    fn from_parts_validates() {
        let rule = RuleSpec::from_parts([3], [2, 3], 2).unwrap();
        assert_eq!(rule, RuleSpec::parse("B3/S2,3").unwrap());
        assert!(RuleSpec::from_parts([27], [2], 2).is_err());
        assert!(RuleSpec::from_parts(Vec::new(), [2], 2).is_err());
        assert!(RuleSpec::from_parts([3], [2], 1).is_err());
    }

    #[test]
    fn predicates_ignore_counts_past_the_neighborhood() {
        let rule = RuleSpec::parse("B26/S26").unwrap();
        assert!(rule.born(26));
        assert!(!rule.born(27));
        assert!(!rule.survives(27));
        assert!(!RuleSpec::UNDEFINED.born(3));
    }
}

//! Dimension input: parsing lengths with units, and flagging values that are probably typos.

use lazy_static::lazy_static;
use regex::Regex;

// -------------------------------------------------------------------------------------------------
// Unit
// -------------------------------------------------------------------------------------------------
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Unit {
    Millimetre,
    Centimetre,
    Metre,
}

impl Unit {
    /// The number of millimetres in one of this unit.
    pub fn millimetres(&self) -> f64 {
        match self {
            Unit::Millimetre => 1.0,
            Unit::Centimetre => 10.0,
            Unit::Metre => 1000.0,
        }
    }

    /// The unit that reads most naturally for a value in millimetres.
    pub fn preferred_for(mm: f64) -> Self {
        if mm >= 1000.0 {
            Unit::Metre
        } else if mm >= 100.0 {
            Unit::Centimetre
        } else {
            Unit::Millimetre
        }
    }

    fn from_suffix(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "" | "mm" => Some(Unit::Millimetre),
            "cm" => Some(Unit::Centimetre),
            "m" => Some(Unit::Metre),
            _ => None,
        }
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Unit::Millimetre => "mm",
            Unit::Centimetre => "cm",
            Unit::Metre => "m",
        };
        write!(f, "{s}")
    }
}

// -------------------------------------------------------------------------------------------------
// parsing
// -------------------------------------------------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    Malformed(String),
    UnknownUnit(String),
    Negative(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Malformed(s) => write!(f, "{s:?} is not a length"),
            ParseError::UnknownUnit(s) => write!(f, "unknown unit {s:?}; expected mm, cm, or m"),
            ParseError::Negative(s) => write!(f, "{s:?} is negative"),
        }
    }
}

impl std::error::Error for ParseError {}

lazy_static! {
    static ref LENGTH_PATTERN: Regex = Regex::new(r"^\s*([0-9]*\.?[0-9]+(?:[eE][+-]?[0-9]+)?|-[0-9.]+)\s*([A-Za-z]*)\s*$")
        .expect("length regex should compile");
}

/// Parse a length such as `2500`, `2500mm`, `250 cm`, or `2.5m` into millimetres.
///
/// A bare number is taken to be in millimetres.
pub fn parse_millimetres(input: &str) -> Result<f64, ParseError> {
    let caps = LENGTH_PATTERN
        .captures(input)
        .ok_or_else(|| ParseError::Malformed(input.to_string()))?;
    let number = &caps[1];
    let suffix = &caps[2];

    if number.starts_with('-') {
        return Err(ParseError::Negative(input.to_string()));
    }
    let unit = Unit::from_suffix(suffix).ok_or_else(|| ParseError::UnknownUnit(suffix.to_string()))?;
    let value: f64 = number
        .parse()
        .map_err(|_| ParseError::Malformed(input.to_string()))?;
    let mm = value * unit.millimetres();
    if !mm.is_finite() {
        return Err(ParseError::Malformed(input.to_string()));
    }
    Ok(mm)
}

// -------------------------------------------------------------------------------------------------
// plausibility
// -------------------------------------------------------------------------------------------------
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    Length,
    Width,
    Height,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Axis::Length => "length",
            Axis::Width => "width",
            Axis::Height => "height",
        };
        write!(f, "{s}")
    }
}

/// Bounds on what a dimension usually looks like, in millimetres.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Range {
    pub min: f64,
    pub max: f64,
    pub typical: (f64, f64),
}

/// Anything at or beyond this is almost certainly entered in the wrong unit.
pub const IMPLAUSIBLE_MM: f64 = 50_000.0;

impl Axis {
    pub fn range(&self) -> Range {
        match self {
            Axis::Length => Range { min: 100.0, max: 5000.0, typical: (800.0, 3000.0) },
            Axis::Width => Range { min: 100.0, max: 5000.0, typical: (600.0, 2500.0) },
            Axis::Height => Range { min: 100.0, max: 4000.0, typical: (500.0, 2000.0) },
        }
    }

    /// Commonly quoted sizes for this axis, in millimetres.
    pub fn common_sizes(&self) -> &'static [f64] {
        match self {
            Axis::Length => &[800.0, 1000.0, 1200.0, 1500.0, 2000.0, 2500.0],
            Axis::Width => &[600.0, 800.0, 900.0, 1200.0, 1600.0, 2000.0],
            Axis::Height => &[500.0, 600.0, 700.0, 900.0, 1200.0, 1500.0],
        }
    }

    pub fn check(&self, mm: f64) -> Plausibility {
        let range = self.range();
        if mm < range.min {
            Plausibility::TooSmall { min: range.min }
        } else if mm >= IMPLAUSIBLE_MM {
            Plausibility::Implausible { typical: range.typical }
        } else if mm > range.max {
            Plausibility::Large { typical: range.typical }
        } else if mm >= range.typical.0 && mm <= range.typical.1 {
            Plausibility::Typical
        } else {
            Plausibility::Unremarkable
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Plausibility {
    /// Below the smallest dimension normally seen
    TooSmall { min: f64 },

    /// Above the usual maximum, but not absurd
    Large { typical: (f64, f64) },

    /// So large that the unit is probably wrong
    Implausible { typical: (f64, f64) },

    Typical,

    Unremarkable,
}

impl Plausibility {
    /// Should the user be warned about this value?
    pub fn is_suspicious(&self) -> bool {
        matches!(
            self,
            Plausibility::TooSmall { .. } | Plausibility::Large { .. } | Plausibility::Implausible { .. }
        )
    }

    /// A message describing the problem with a value on the given axis, if any.
    pub fn warning(&self, axis: Axis) -> Option<String> {
        match self {
            Plausibility::TooSmall { min } => {
                Some(format!("{axis} looks too small; a {axis} is normally at least {min}mm"))
            }
            Plausibility::Large { typical: (lo, hi) } => {
                Some(format!("{axis} is unusually large; common {axis}s are {lo}-{hi}mm"))
            }
            Plausibility::Implausible { typical: (lo, hi) } => Some(format!(
                "{axis} is implausibly large; check the unit (common {axis}s are {lo}-{hi}mm)"
            )),
            Plausibility::Typical | Plausibility::Unremarkable => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_units() {
        assert_eq!(parse_millimetres("2500"), Ok(2500.0));
        assert_eq!(parse_millimetres("2500mm"), Ok(2500.0));
        assert_eq!(parse_millimetres("250 cm"), Ok(2500.0));
        assert_eq!(parse_millimetres("2.5m"), Ok(2500.0));
        assert_eq!(parse_millimetres(" 2.5M "), Ok(2500.0));
        assert_eq!(parse_millimetres(".5m"), Ok(500.0));
    }

    #[test]
    fn parse_errors() {
        assert_eq!(parse_millimetres("tall"), Err(ParseError::Malformed("tall".into())));
        assert_eq!(parse_millimetres("3ft"), Err(ParseError::UnknownUnit("ft".into())));
        assert_eq!(parse_millimetres("-3m"), Err(ParseError::Negative("-3m".into())));
        assert_eq!(parse_millimetres(""), Err(ParseError::Malformed("".into())));
    }

    #[test]
    fn preferred_unit() {
        assert_eq!(Unit::preferred_for(2500.0), Unit::Metre);
        assert_eq!(Unit::preferred_for(250.0), Unit::Centimetre);
        assert_eq!(Unit::preferred_for(25.0), Unit::Millimetre);
    }

    #[test]
    fn plausibility() {
        assert_eq!(Axis::Length.check(50.0), Plausibility::TooSmall { min: 100.0 });
        assert_eq!(Axis::Length.check(1500.0), Plausibility::Typical);
        assert_eq!(Axis::Length.check(4000.0), Plausibility::Unremarkable);
        assert_eq!(Axis::Height.check(4500.0), Plausibility::Large { typical: (500.0, 2000.0) });
        assert_eq!(
            Axis::Width.check(60_000.0),
            Plausibility::Implausible { typical: (600.0, 2500.0) }
        );
        assert!(!Axis::Width.check(700.0).is_suspicious());
        assert!(Axis::Width.check(7000.0).is_suspicious());
    }

    #[test]
    fn warnings() {
        assert_eq!(
            Axis::Height.check(20.0).warning(Axis::Height).as_deref(),
            Some("height looks too small; a height is normally at least 100mm")
        );
        assert_eq!(Axis::Height.check(800.0).warning(Axis::Height), None);
    }
}

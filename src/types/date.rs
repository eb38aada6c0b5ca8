use core::str::FromStr;

use crate::error::{intern, Error, PrimitiveErrorKind, Result};

fn invalid(msg: &str) -> Error {
    PrimitiveErrorKind::InvalidDuration { msg: intern(msg) }.into()
}

/// An ISO 8601 duration (`PnYnMnDTnHnMnS`).
///
/// Components are unsigned magnitudes with a single sign flag: a negative
/// duration negates every component. All components are integers except
/// `seconds`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Duration {
    pub negative: bool,
    pub years: u64,
    pub months: u64,
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: f64,
}

impl Duration {
    pub fn is_zero(&self) -> bool {
        self.years == 0
            && self.months == 0
            && self.days == 0
            && self.hours == 0
            && self.minutes == 0
            && self.seconds == 0.0
    }
}

impl FromStr for Duration {
    type Err = Error;

    /// Parses `PnYnMnDTnHnMnS`, accepting either `.` or `,` as the decimal
    /// mark in the seconds component.
    fn from_str(text: &str) -> Result<Self> {
        let mut duration = Duration::default();
        let mut rest = text;

        if let Some(stripped) = rest.strip_prefix('-') {
            duration.negative = true;
            rest = stripped;
        }

        let body = rest
            .strip_prefix('P')
            .ok_or_else(|| invalid("missing leading `P` designator"))?;
        if body.is_empty() {
            return Err(invalid("no components after `P`"));
        }

        let (date_part, time_part) = match body.split_once('T') {
            Some((date, time)) => {
                if time.is_empty() {
                    return Err(invalid("no components after `T`"));
                }
                (date, Some(time))
            }
            None => (body, None),
        };

        let mut seen = false;
        parse_components(date_part, false, &mut duration, &mut seen)?;
        if let Some(time_part) = time_part {
            parse_components(time_part, true, &mut duration, &mut seen)?;
        }

        if !seen {
            return Err(invalid("no components after `P`"));
        }

        Ok(duration)
    }
}

fn parse_components(
    part: &str,
    in_time: bool,
    duration: &mut Duration,
    seen: &mut bool,
) -> Result<()> {
    let mut number = String::new();

    for ch in part.chars() {
        if ch.is_ascii_digit() || ch == '.' || ch == ',' {
            number.push(if ch == ',' { '.' } else { ch });
            continue;
        }

        if number.is_empty() {
            return Err(invalid("designator without a value"));
        }

        let is_fractional = number.contains('.');
        match (in_time, ch) {
            (false, 'Y') => duration.years = parse_integer(&number)?,
            (false, 'M') => duration.months = parse_integer(&number)?,
            (false, 'W') => duration.days = parse_integer(&number)?.saturating_mul(7),
            (false, 'D') => duration.days = parse_integer(&number)?,
            (true, 'H') => duration.hours = parse_integer(&number)?,
            (true, 'M') => duration.minutes = parse_integer(&number)?,
            (true, 'S') => {
                duration.seconds = number
                    .parse::<f64>()
                    .map_err(|_| invalid("malformed seconds component"))?;
            }
            _ => return Err(invalid("unknown duration designator")),
        }

        if is_fractional && ch != 'S' {
            return Err(invalid("only the seconds component may be fractional"));
        }

        *seen = true;
        number.clear();
    }

    if !number.is_empty() {
        return Err(invalid("trailing value without a designator"));
    }

    Ok(())
}

fn parse_integer(text: &str) -> Result<u64> {
    text.parse::<u64>()
        .map_err(|_| invalid("malformed integer component"))
}

impl core::fmt::Display for Duration {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.negative {
            write!(f, "-")?;
        }
        write!(f, "P")?;

        if self.is_zero() {
            return write!(f, "T0S");
        }

        if self.years > 0 {
            write!(f, "{}Y", self.years)?;
        }
        if self.months > 0 {
            write!(f, "{}M", self.months)?;
        }
        if self.days > 0 {
            write!(f, "{}D", self.days)?;
        }

        if self.hours > 0 || self.minutes > 0 || self.seconds != 0.0 {
            write!(f, "T")?;
            if self.hours > 0 {
                write!(f, "{}H", self.hours)?;
            }
            if self.minutes > 0 {
                write!(f, "{}M", self.minutes)?;
            }
            if self.seconds != 0.0 {
                if self.seconds.fract() == 0.0 {
                    write!(f, "{}S", self.seconds as u64)?;
                } else {
                    write!(f, "{}S", self.seconds)?;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_form() {
        let duration: Duration = "P1Y2M3DT4H5M6.5S".parse().unwrap();
        assert_eq!(1, duration.years);
        assert_eq!(2, duration.months);
        assert_eq!(3, duration.days);
        assert_eq!(4, duration.hours);
        assert_eq!(5, duration.minutes);
        assert_eq!(6.5, duration.seconds);
        assert!(!duration.negative);
    }

    #[test]
    fn comma_decimal_mark() {
        let duration: Duration = "PT0,5S".parse().unwrap();
        assert_eq!(0.5, duration.seconds);
    }

    #[test]
    fn negative_applies_to_all_components() {
        let duration: Duration = "-P1DT2H".parse().unwrap();
        assert!(duration.negative);
        assert_eq!(1, duration.days);
        assert_eq!(2, duration.hours);
    }

    #[test]
    fn weeks_convert_to_days() {
        let duration: Duration = "P2W".parse().unwrap();
        assert_eq!(14, duration.days);
    }

    #[test]
    fn rejects_malformed() {
        assert!("1Y".parse::<Duration>().is_err());
        assert!("P".parse::<Duration>().is_err());
        assert!("PT".parse::<Duration>().is_err());
        assert!("P1.5Y".parse::<Duration>().is_err());
        assert!("P1X".parse::<Duration>().is_err());
    }

    #[test]
    fn round_trips_through_display() {
        for text in ["P1Y2M3DT4H5M6.5S", "PT0.5S", "-P1DT2H", "P3D"] {
            let duration: Duration = text.parse().unwrap();
            let shown = duration.to_string();
            assert_eq!(duration, shown.parse::<Duration>().unwrap());
        }
    }
}

use core::fmt;
use core::str::FromStr;

/// One entry of a mission plan, e.g. `descend:40`, `rth`, `emergency`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MissionStep {
    Descend(f64),
    ReturnToHome,
    Emergency,
}

impl FromStr for MissionStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.split_once(':') {
            Some(("descend", value)) => value
                .trim()
                .parse::<f64>()
                .map(Self::Descend)
                .map_err(|_| format!("invalid setpoint `{value}` in `{s}`")),
            Some((other, _)) => Err(format!("unknown plan step `{other}`")),
            None => match s {
                "rth" | "home" => Ok(Self::ReturnToHome),
                "emergency" | "land" => Ok(Self::Emergency),
                "descend" => Err("`descend` needs a setpoint, e.g. `descend:40`".to_string()),
                other => Err(format!("unknown plan step `{other}`")),
            },
        }
    }
}

impl fmt::Display for MissionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Descend(setpoint) => write!(f, "descend:{setpoint}"),
            Self::ReturnToHome => f.write_str("rth"),
            Self::Emergency => f.write_str("emergency"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_steps() {
        assert_eq!("descend:40".parse(), Ok(MissionStep::Descend(40.0)));
        assert_eq!(" descend: 12.5 ".parse(), Ok(MissionStep::Descend(12.5)));
        assert_eq!("rth".parse(), Ok(MissionStep::ReturnToHome));
        assert_eq!("home".parse(), Ok(MissionStep::ReturnToHome));
        assert_eq!("emergency".parse(), Ok(MissionStep::Emergency));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("descend".parse::<MissionStep>().is_err());
        assert!("descend:abc".parse::<MissionStep>().is_err());
        assert!("climb:10".parse::<MissionStep>().is_err());
        assert!("hover".parse::<MissionStep>().is_err());
    }

    #[test]
    fn test_negative_setpoint_parses() {
        // Rejected later by the drone, not by the parser
        assert_eq!("descend:-5".parse(), Ok(MissionStep::Descend(-5.0)));
    }

    #[test]
    fn test_display() {
        assert_eq!(MissionStep::Descend(40.0).to_string(), "descend:40");
        assert_eq!(MissionStep::ReturnToHome.to_string(), "rth");
    }
}

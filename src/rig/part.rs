//! Named segments of the humanoid ragdoll

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One segment of the 14-part humanoid rig
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Part {
    Head,
    Torso,
    LeftUpperArm,
    RightUpperArm,
    LeftForearm,
    RightForearm,
    LeftHand,
    RightHand,
    LeftThigh,
    RightThigh,
    LeftShin,
    RightShin,
    LeftFoot,
    RightFoot,
}

impl Part {
    /// All parts in rig order
    pub const ALL: [Part; 14] = [
        Part::Head,
        Part::Torso,
        Part::LeftUpperArm,
        Part::RightUpperArm,
        Part::LeftForearm,
        Part::RightForearm,
        Part::LeftHand,
        Part::RightHand,
        Part::LeftThigh,
        Part::RightThigh,
        Part::LeftShin,
        Part::RightShin,
        Part::LeftFoot,
        Part::RightFoot,
    ];

    /// Stable identifier, matches the serialized form
    pub fn name(&self) -> &'static str {
        match self {
            Part::Head => "head",
            Part::Torso => "torso",
            Part::LeftUpperArm => "leftUpperArm",
            Part::RightUpperArm => "rightUpperArm",
            Part::LeftForearm => "leftForearm",
            Part::RightForearm => "rightForearm",
            Part::LeftHand => "leftHand",
            Part::RightHand => "rightHand",
            Part::LeftThigh => "leftThigh",
            Part::RightThigh => "rightThigh",
            Part::LeftShin => "leftShin",
            Part::RightShin => "rightShin",
            Part::LeftFoot => "leftFoot",
            Part::RightFoot => "rightFoot",
        }
    }

    /// The same part on the other side of the body (head and torso map to themselves)
    pub fn mirrored(&self) -> Part {
        match self {
            Part::Head => Part::Head,
            Part::Torso => Part::Torso,
            Part::LeftUpperArm => Part::RightUpperArm,
            Part::RightUpperArm => Part::LeftUpperArm,
            Part::LeftForearm => Part::RightForearm,
            Part::RightForearm => Part::LeftForearm,
            Part::LeftHand => Part::RightHand,
            Part::RightHand => Part::LeftHand,
            Part::LeftThigh => Part::RightThigh,
            Part::RightThigh => Part::LeftThigh,
            Part::LeftShin => Part::RightShin,
            Part::RightShin => Part::LeftShin,
            Part::LeftFoot => Part::RightFoot,
            Part::RightFoot => Part::LeftFoot,
        }
    }
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Part {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Part::ALL
            .iter()
            .copied()
            .find(|part| part.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown rig part: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        for part in Part::ALL {
            assert_eq!(part.name().parse::<Part>(), Ok(part));
        }
        assert_eq!("LEFTFOOT".parse::<Part>(), Ok(Part::LeftFoot));
        assert!("tail".parse::<Part>().is_err());
    }

    #[test]
    fn test_mirrored_is_involution() {
        for part in Part::ALL {
            assert_eq!(part.mirrored().mirrored(), part);
        }
        assert_eq!(Part::LeftShin.mirrored(), Part::RightShin);
    }
}

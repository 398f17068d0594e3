// Core domain types: positions, roles, tiers, scoring categories, and the
// player record carried through the valuation pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Per-category float vector keyed by `Category`. BTreeMap keeps iteration
/// order stable across runs.
pub type CategoryMap = BTreeMap<Category, f64>;

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// Baseball positions used for pool keys and eligibility tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Position {
    Catcher,
    FirstBase,
    SecondBase,
    ThirdBase,
    ShortStop,
    LeftField,
    CenterField,
    RightField,
    Outfield,
    DesignatedHitter,
    Utility,
    StartingPitcher,
    ReliefPitcher,
    Bench,
    InjuredList,
}

impl Position {
    /// Parse an eligibility/roster tag into a Position.
    ///
    /// Handles ESPN-style abbreviations:
    /// - "1B"/"2B"/"3B" for the infield corners and middle
    /// - "OF" as the generic outfield slot (distinct from LF/CF/RF)
    /// - "UTIL"/"UT" for the flex slot, "BE"/"BN" bench, "IL"/"DL" injured list
    pub fn from_tag(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "C" => Some(Position::Catcher),
            "1B" => Some(Position::FirstBase),
            "2B" => Some(Position::SecondBase),
            "3B" => Some(Position::ThirdBase),
            "SS" => Some(Position::ShortStop),
            "LF" => Some(Position::LeftField),
            "CF" => Some(Position::CenterField),
            "RF" => Some(Position::RightField),
            "OF" => Some(Position::Outfield),
            "DH" => Some(Position::DesignatedHitter),
            "UTIL" | "UT" => Some(Position::Utility),
            "SP" => Some(Position::StartingPitcher),
            "RP" => Some(Position::ReliefPitcher),
            "BE" | "BN" => Some(Position::Bench),
            "IL" | "DL" => Some(Position::InjuredList),
            _ => None,
        }
    }

    /// Display string for this position.
    pub fn as_str(&self) -> &'static str {
        match self {
            Position::Catcher => "C",
            Position::FirstBase => "1B",
            Position::SecondBase => "2B",
            Position::ThirdBase => "3B",
            Position::ShortStop => "SS",
            Position::LeftField => "LF",
            Position::CenterField => "CF",
            Position::RightField => "RF",
            Position::Outfield => "OF",
            Position::DesignatedHitter => "DH",
            Position::Utility => "UTIL",
            Position::StartingPitcher => "SP",
            Position::ReliefPitcher => "RP",
            Position::Bench => "BE",
            Position::InjuredList => "IL",
        }
    }

    /// Whether this position can key a valuation pool (has its own rostered
    /// tier). UTIL is built separately; DH/BE/IL never key a pool.
    pub fn is_valuation_slot(&self) -> bool {
        !matches!(
            self,
            Position::DesignatedHitter
                | Position::Utility
                | Position::Bench
                | Position::InjuredList
        )
    }

    /// Whether a roster slot at `self` accepts a player carrying the
    /// eligibility tag `eligible`. The generic OF slot accepts any outfield
    /// tag and vice versa.
    pub fn accepts(&self, eligible: Position) -> bool {
        if *self == eligible {
            return true;
        }
        match (self, eligible) {
            (
                Position::Outfield,
                Position::LeftField | Position::CenterField | Position::RightField,
            ) => true,
            (
                Position::LeftField | Position::CenterField | Position::RightField,
                Position::Outfield,
            ) => true,
            _ => false,
        }
    }

    /// Deterministic ordering index for report rows.
    pub fn sort_order(&self) -> u8 {
        match self {
            Position::Catcher => 0,
            Position::FirstBase => 1,
            Position::SecondBase => 2,
            Position::ThirdBase => 3,
            Position::ShortStop => 4,
            Position::LeftField => 5,
            Position::CenterField => 6,
            Position::RightField => 7,
            Position::Outfield => 8,
            Position::Utility => 9,
            Position::DesignatedHitter => 10,
            Position::StartingPitcher => 11,
            Position::ReliefPitcher => 12,
            Position::Bench => 13,
            Position::InjuredList => 14,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Valuation role. Starters and relievers are valued in separate pools with
/// different category sets, so the role split lives here rather than in the
/// position tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Hitter,
    SP,
    RP,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Hitter => "HITTER",
            Role::SP => "SP",
            Role::RP => "RP",
        }
    }

    pub fn is_pitcher(&self) -> bool {
        matches!(self, Role::SP | Role::RP)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tier
// ---------------------------------------------------------------------------

/// Where a player landed relative to the replacement boundary of their pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    Rostered,
    Replacement,
    BelowReplacement,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Rostered => "ROSTERED",
            Tier::Replacement => "REPLACEMENT",
            Tier::BelowReplacement => "BELOW_REPLACEMENT",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// Scoring categories. The set a pool actually scores on is resolved from the
/// league file; this enum is the full universe the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    R,
    HR,
    RBI,
    SBN,
    OBP,
    SLG,
    ERA,
    WHIP,
    K9,
    QS,
    SVHD,
    OUTS,
}

impl Category {
    /// Parse a league-file category name. "K/9" and "IP" are the wire
    /// spellings for K9 and OUTS.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "R" => Some(Category::R),
            "HR" => Some(Category::HR),
            "RBI" => Some(Category::RBI),
            "SBN" => Some(Category::SBN),
            "OBP" => Some(Category::OBP),
            "SLG" => Some(Category::SLG),
            "ERA" => Some(Category::ERA),
            "WHIP" => Some(Category::WHIP),
            "K/9" | "K9" => Some(Category::K9),
            "QS" => Some(Category::QS),
            "SVHD" => Some(Category::SVHD),
            "OUTS" | "IP" => Some(Category::OUTS),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::R => "R",
            Category::HR => "HR",
            Category::RBI => "RBI",
            Category::SBN => "SBN",
            Category::OBP => "OBP",
            Category::SLG => "SLG",
            Category::ERA => "ERA",
            Category::WHIP => "WHIP",
            Category::K9 => "K9",
            Category::QS => "QS",
            Category::SVHD => "SVHD",
            Category::OUTS => "OUTS",
        }
    }

    /// Rate stats are budgeted by weighted playing time rather than by
    /// production share.
    pub fn is_rate(&self) -> bool {
        matches!(
            self,
            Category::OBP | Category::SLG | Category::ERA | Category::WHIP | Category::K9
        )
    }

}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Engine-facing hitter projection. `sbn` is net steals (SB − CS) and
/// `wrc_plus` is the composite metric used for initial ranking.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct HitterStats {
    pub pa: f64,
    pub ab: f64,
    pub r: f64,
    pub hr: f64,
    pub rbi: f64,
    pub sbn: f64,
    pub obp: f64,
    pub slg: f64,
    pub wrc_plus: f64,
}

/// Engine-facing pitcher projection. `outs` is the canonical innings
/// representation (`ip = outs / 3`); `fip` is the composite metric. SP
/// records carry `svhd = 0`, RP records carry `qs = 0`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PitcherStats {
    pub outs: f64,
    pub era: f64,
    pub whip: f64,
    pub k9: f64,
    pub qs: f64,
    pub svhd: f64,
    pub fip: f64,
}

/// Either side of the projection universe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum Stats {
    Hitter(HitterStats),
    Pitcher(PitcherStats),
}

impl Stats {
    /// The stat value feeding the given scoring category. Role-foreign
    /// categories read as 0.
    pub fn category(&self, cat: Category) -> f64 {
        match self {
            Stats::Hitter(h) => match cat {
                Category::R => h.r,
                Category::HR => h.hr,
                Category::RBI => h.rbi,
                Category::SBN => h.sbn,
                Category::OBP => h.obp,
                Category::SLG => h.slg,
                _ => 0.0,
            },
            Stats::Pitcher(p) => match cat {
                Category::ERA => p.era,
                Category::WHIP => p.whip,
                Category::K9 => p.k9,
                Category::QS => p.qs,
                Category::SVHD => p.svhd,
                Category::OUTS => p.outs,
                _ => 0.0,
            },
        }
    }

    /// Single scalar proxy for overall quality: wRC+ for hitters, negated
    /// FIP for pitchers (lower FIP is better).
    pub fn composite_metric(&self) -> f64 {
        match self {
            Stats::Hitter(h) => h.wrc_plus,
            Stats::Pitcher(p) => -p.fip,
        }
    }

    pub fn plate_appearances(&self) -> f64 {
        match self {
            Stats::Hitter(h) => h.pa,
            Stats::Pitcher(_) => 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// Engine output attached to a player. Created empty by the normalizer and
/// filled in by the pipeline stages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Computed {
    pub primary_position: Option<Position>,
    pub raw_z: CategoryMap,
    pub normalized_z: CategoryMap,
    pub total_z: f64,
    pub dollar_values: CategoryMap,
    pub total_dollars: f64,
    pub tier: Option<Tier>,
}

/// A projected player. Created once by the normalizer; only the `computed`
/// sub-record is mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub name: String,
    pub team: String,
    pub positions: Vec<Position>,
    pub role: Role,
    pub stats: Stats,
    pub computed: Computed,
}

impl Player {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        team: impl Into<String>,
        positions: Vec<Position>,
        role: Role,
        stats: Stats,
    ) -> Self {
        Player {
            id: id.into(),
            name: name.into(),
            team: team.into(),
            positions,
            role,
            stats,
            computed: Computed::default(),
        }
    }

    /// Whether this player may fill a roster slot at `slot`.
    pub fn eligible_at(&self, slot: Position) -> bool {
        self.positions.iter().any(|&p| slot.accepts(p))
    }

    /// Pure DH: eligibility is exactly the DH tag. These players enter the
    /// valuation only through the UTIL pool.
    pub fn is_pure_dh(&self) -> bool {
        self.positions.len() == 1 && self.positions[0] == Position::DesignatedHitter
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

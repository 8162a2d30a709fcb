//! Medical vocabulary: injuries, body locations, supplies, vitals ordinals and tags
//!
//! Every fixed-label field the evaluation server sends is a tagged variant here.
//! Labels are matched case-insensitively with `_`/`-` treated as spaces, so
//! `"RIGHT_CALF"`, `"right calf"` and `"Right-Calf"` all parse to the same value.
//! Enums declared with a fallback never fail to parse: an unseen label is
//! logged and rewritten to the fallback.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

fn normalize_label(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| if c == '_' || c == '-' { ' ' } else { c.to_ascii_lowercase() })
        .collect()
}

macro_rules! labeled_enum {
    (@fallback) => { None };
    (@fallback $fb:ident) => { Some(Self::$fb) };
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $label:literal ),+ $(,)?
        }
        $(fallback = $fallback:ident;)?
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Every variant in declaration order.
            pub const ALL: &'static [$name] = &[ $( $name::$variant ),+ ];

            /// Wire label for this variant.
            pub fn name(self) -> &'static str {
                match self {
                    $( $name::$variant => $label ),+
                }
            }

            /// Strict lookup by label.
            pub fn from_name(raw: &str) -> Option<Self> {
                let wanted = normalize_label(raw);
                Self::ALL.iter().copied().find(|v| normalize_label(v.name()) == wanted)
            }

            /// Value substituted for unknown labels, if this enum has one.
            pub fn fallback() -> Option<Self> {
                labeled_enum!(@fallback $($fallback)?)
            }

            /// Lookup that rewrites unknown labels to the fallback with a warning.
            pub fn parse_lenient(raw: &str) -> Option<Self> {
                Self::from_name(raw).or_else(|| {
                    let fb = Self::fallback()?;
                    tracing::warn!(
                        kind = stringify!($name),
                        value = %raw,
                        fallback = fb.name(),
                        "Unknown label, substituting fallback"
                    );
                    Some(fb)
                })
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.name())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.name())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                Self::parse_lenient(&raw).ok_or_else(|| {
                    serde::de::Error::custom(format!(
                        "unknown {} '{}'",
                        stringify!($name),
                        raw
                    ))
                })
            }
        }
    };
}

// ============================================================================
// Injuries
// ============================================================================

labeled_enum! {
    /// Kind of injury a casualty carries.
    pub enum InjuryKind {
        EarBleed => "Ear Bleed",
        Asthmatic => "Asthmatic",
        Laceration => "Laceration",
        Puncture => "Puncture",
        Shrapnel => "Shrapnel",
        ChestCollapse => "Chest Collapse",
        Amputation => "Amputation",
        Burn => "Burn",
        Abrasion => "Abrasion",
        BrokenBone => "Broken Bone",
        Internal => "Internal",
        TraumaticBrainInjury => "Traumatic Brain Injury",
        OpenAbdominalWound => "Open Abdominal Wound",
        ForeheadScrape => "Forehead Scrape",
        BurnSuffocation => "Burn Suffocation",
        EyeTrauma => "Eye Trauma",
    }
    fallback = ForeheadScrape;
}

impl InjuryKind {
    /// Severity assumed when the server omits one.
    pub fn default_severity(self) -> f64 {
        match self {
            InjuryKind::ForeheadScrape => 0.1,
            InjuryKind::Puncture => 0.3,
            InjuryKind::Shrapnel => 0.4,
            InjuryKind::Laceration => 0.6,
            InjuryKind::EarBleed => 0.8,
            InjuryKind::ChestCollapse => 0.9,
            InjuryKind::Amputation => 1.0,
            _ => 0.7,
        }
    }

    /// Penetrating vs. blunt trauma, used by TRISS.
    pub fn is_penetrating(self) -> bool {
        matches!(
            self,
            InjuryKind::Puncture
                | InjuryKind::Shrapnel
                | InjuryKind::Amputation
                | InjuryKind::OpenAbdominalWound
        )
    }
}

labeled_enum! {
    /// Body location of an injury or a treatment.
    pub enum BodyLocation {
        RightForearm => "right forearm",
        LeftForearm => "left forearm",
        RightHand => "right hand",
        LeftHand => "left hand",
        RightLeg => "right leg",
        LeftLeg => "left leg",
        RightCalf => "right calf",
        LeftCalf => "left calf",
        RightThigh => "right thigh",
        LeftThigh => "left thigh",
        RightStomach => "right stomach",
        LeftStomach => "left stomach",
        RightBicep => "right bicep",
        LeftBicep => "left bicep",
        RightShoulder => "right shoulder",
        LeftShoulder => "left shoulder",
        RightSide => "right side",
        LeftSide => "left side",
        RightChest => "right chest",
        LeftChest => "left chest",
        CenterChest => "center chest",
        RightWrist => "right wrist",
        LeftWrist => "left wrist",
        LeftFace => "left face",
        RightFace => "right face",
        LeftNeck => "left neck",
        RightNeck => "right neck",
        Internal => "internal",
        Head => "head",
        Neck => "neck",
        Stomach => "stomach",
        Unspecified => "unspecified",
    }
    fallback = Unspecified;
}

/// Anatomical region used for Injury Severity Score bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyRegion {
    HeadNeck,
    Face,
    Chest,
    Abdomen,
    Extremity,
    External,
}

impl BodyLocation {
    pub fn region(self) -> BodyRegion {
        use BodyLocation::*;
        match self {
            RightNeck | LeftNeck | Head | Neck => BodyRegion::HeadNeck,
            LeftFace | RightFace => BodyRegion::Face,
            RightChest | LeftChest | CenterChest => BodyRegion::Chest,
            RightStomach | LeftStomach | RightSide | LeftSide | Stomach | Internal => {
                BodyRegion::Abdomen
            }
            Unspecified => BodyRegion::External,
            _ => BodyRegion::Extremity,
        }
    }
}

labeled_enum! {
    /// Clinical severity label attached to injuries by the server.
    pub enum InjurySeverity {
        Minor => "minor",
        Moderate => "moderate",
        Substantial => "substantial",
        Major => "major",
        Extreme => "extreme",
    }
}

impl InjurySeverity {
    /// Label for a numeric severity in [0, 1].
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s < 0.2 => InjurySeverity::Minor,
            s if s < 0.4 => InjurySeverity::Moderate,
            s if s < 0.6 => InjurySeverity::Substantial,
            s if s < 0.8 => InjurySeverity::Major,
            _ => InjurySeverity::Extreme,
        }
    }

    /// Representative numeric severity for a label.
    pub fn score(self) -> f64 {
        match self {
            InjurySeverity::Minor => 0.1,
            InjurySeverity::Moderate => 0.3,
            InjurySeverity::Substantial => 0.5,
            InjurySeverity::Major => 0.7,
            InjurySeverity::Extreme => 0.9,
        }
    }

    /// Abbreviated Injury Scale points squared, as summed by ISS.
    pub fn iss_points(self) -> u32 {
        match self {
            InjurySeverity::Minor => 1,
            InjurySeverity::Moderate => 4,
            InjurySeverity::Substantial => 9,
            InjurySeverity::Major => 16,
            InjurySeverity::Extreme => 25,
        }
    }
}

labeled_enum! {
    /// Contribution level of an injury to a damage channel.
    pub enum EffectLevel {
        None => "NONE",
        Minimal => "MINIMAL",
        Moderate => "MODERATE",
        Severe => "SEVERE",
        Critical => "CRITICAL",
        Fatal => "FATAL",
    }
}

// ============================================================================
// Supplies
// ============================================================================

labeled_enum! {
    /// Medical supply type.
    pub enum SupplyKind {
        Tourniquet => "Tourniquet",
        PressureBandage => "Pressure bandage",
        HemostaticGauze => "Hemostatic gauze",
        DecompressionNeedle => "Decompression Needle",
        NasopharyngealAirway => "Nasopharyngeal airway",
        PulseOximeter => "Pulse Oximeter",
        Blanket => "Blanket",
        EpiPen => "Epi Pen",
        VentedChestSeal => "Vented Chest Seal",
        PainMedications => "Pain Medications",
        FentanylLollipop => "Fentanyl Lollipop",
        Splint => "Splint",
        Blood => "Blood",
        IvBag => "IV Bag",
        BurnDressing => "Burn Dressing",
    }
}

// ============================================================================
// Vitals
// ============================================================================

labeled_enum! {
    /// Observed mental status.
    pub enum MentalStatus {
        Calm => "CALM",
        Confused => "CONFUSED",
        Agony => "AGONY",
        Shock => "SHOCK",
        Upset => "UPSET",
        Unresponsive => "UNRESPONSIVE",
    }
}

labeled_enum! {
    /// AVPU responsiveness scale.
    pub enum Avpu {
        Alert => "ALERT",
        Voice => "VOICE",
        Pain => "PAIN",
        Unresponsive => "UNRESPONSIVE",
    }
}

impl Avpu {
    /// Glasgow Coma Scale component used by the Revised Trauma Score.
    pub fn gcs_points(self) -> f64 {
        match self {
            Avpu::Alert => 4.0,
            Avpu::Voice => 3.0,
            Avpu::Pain => 2.0,
            Avpu::Unresponsive => 0.0,
        }
    }

    pub fn is_verbal(self) -> bool {
        matches!(self, Avpu::Alert | Avpu::Voice)
    }
}

labeled_enum! {
    /// Breathing observation.
    pub enum BreathingLevel {
        Normal => "NORMAL",
        Fast => "FAST",
        Slow => "SLOW",
        Restricted => "RESTRICTED",
        None => "NONE",
    }
}

impl BreathingLevel {
    /// Respiratory-rate component of the Revised Trauma Score.
    pub fn rts_points(self) -> f64 {
        match self {
            BreathingLevel::None => 0.0,
            BreathingLevel::Restricted => 1.0,
            BreathingLevel::Slow => 2.0,
            BreathingLevel::Fast => 3.0,
            BreathingLevel::Normal => 4.0,
        }
    }
}

labeled_enum! {
    /// Palpated heart rate.
    pub enum HeartRate {
        Normal => "NORMAL",
        Faint => "FAINT",
        Fast => "FAST",
        None => "NONE",
    }
}

labeled_enum! {
    /// Pulse oximetry reading.
    pub enum Spo2 {
        Normal => "NORMAL",
        Low => "LOW",
    }
}

labeled_enum! {
    /// Triage tag category.
    pub enum TriageTag {
        Minimal => "MINIMAL",
        Delayed => "DELAYED",
        Immediate => "IMMEDIATE",
        Expectant => "EXPECTANT",
    }
}

// ============================================================================
// Valued ordinals (used directly as numeric case features)
// ============================================================================

labeled_enum! {
    /// Stated intent of a casualty toward others.
    pub enum Intent {
        IntendMajorHelp => "intend major help",
        IntendMinorHelp => "intend minor help",
        NoIntent => "no intent",
        IntendMinorHarm => "intend minor harm",
        IntendMajorHarm => "intend major harm",
    }
}

impl Intent {
    pub fn valuation(self) -> f64 {
        match self {
            Intent::IntendMajorHelp => 0.5,
            Intent::IntendMinorHelp => 0.25,
            Intent::NoIntent => 0.0,
            Intent::IntendMinorHarm => -0.25,
            Intent::IntendMajorHarm => -0.5,
        }
    }
}

labeled_enum! {
    /// How directly a casualty caused the incident.
    pub enum Directness {
        None => "none",
        Indirect => "indirect",
        SomewhatIndirect => "somewhat indirect",
        SomewhatDirect => "somewhat direct",
        Direct => "direct",
    }
}

impl Directness {
    pub fn valuation(self) -> f64 {
        match self {
            Directness::None => 0.0,
            Directness::Indirect => 0.25,
            Directness::SomewhatIndirect => 0.5,
            Directness::SomewhatDirect => 0.75,
            Directness::Direct => 1.0,
        }
    }
}

/// Normalized military rank in [0, 1] from a paygrade such as `E-4`, `W-2` or `O-3`.
pub fn rank_ordinal(paygrade: &str) -> Option<f64> {
    let cleaned: String = paygrade
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_uppercase();
    let (grade, number) = cleaned.split_at(cleaned.len().min(1));
    let n: f64 = number.parse::<u8>().ok()?.into();
    let offset = match grade {
        "E" if (1.0..=9.0).contains(&n) => 0.0,
        "W" if (1.0..=5.0).contains(&n) => 9.0,
        "O" if (1.0..=10.0).contains(&n) => 14.0,
        _ => return None,
    };
    Some((offset + n) / 24.0)
}

//! # Survey Input Domains
//!
//! The respondent questionnaire has a fixed shape: three integer fields and four
//! closed categorical fields, using the General Social Survey vocabulary. This module
//! owns those domains and the two records that carry answers through the application:
//!
//! - `RespondentForm` is what the collector emits: integers plus category *labels*.
//! - `Respondent` is the validated form, with each label resolved to its enum variant.
//!
//! Integer fields are clamped to their domain by the collector, never rejected.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const AGE_MIN: i64 = 16;
pub const AGE_MAX: i64 = 99;
pub const AGE_DEFAULT: i64 = 35;

pub const PRESTIGE_MIN: i64 = 0;
pub const PRESTIGE_MAX: i64 = 100;
pub const PRESTIGE_DEFAULT: i64 = 45;

pub const CHILDS_MIN: i64 = 0;
pub const CHILDS_MAX: i64 = 20;
pub const CHILDS_DEFAULT: i64 = 2;

/// A categorical answer that is not part of its field's closed domain.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("'{value}' is not a valid value for field '{field}'")]
pub struct UnknownCategory {
    pub field: &'static str,
    pub value: String,
}

/// Declares a closed categorical domain: the enum, its display order, and the
/// exact-label conversions in both directions. Extra labels after `|` are
/// accepted on input but never displayed.
macro_rules! categorical {
    (
        $(#[$meta:meta])*
        $name:ident, field = $field:literal {
            $($variant:ident => $label:literal $(| $alias:literal)*),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every option, in the order the form presents them.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The questionnaire field this domain belongs to.
            pub const FIELD: &'static str = $field;

            /// The canonical label shown to the user and matched on input.
            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            fn accepts(self, s: &str) -> bool {
                match self {
                    $($name::$variant => s == $label $(|| s == $alias)*),+
                }
            }

            pub fn labels() -> Vec<&'static str> {
                Self::ALL.iter().map(|v| v.label()).collect()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $name {
            type Err = UnknownCategory;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.accepts(s))
                    .ok_or_else(|| UnknownCategory {
                        field: Self::FIELD,
                        value: s.to_string(),
                    })
            }
        }
    };
}

categorical! {
    Gender, field = "gender" {
        Male => "Male",
        Female => "Female",
    }
}

categorical! {
    /// Highest completed level of education (`educcat`).
    EducationLevel, field = "educcat" {
        LessThanHighSchool => "Less Than High School",
        HighSchool => "High School",
        JuniorCollege => "Junior College",
        Bachelor => "Bachelor",
        Graduate => "Graduate",
    }
}

categorical! {
    MaritalStatus, field = "marital" {
        Married => "Married",
        NeverMarried => "Never Married",
        Divorced => "Divorced",
        Separated => "Separated",
        Widowed => "Widowed",
    }
}

categorical! {
    /// Labor force status during the survey week (`wrkstat`).
    WorkStatus, field = "wrkstat" {
        FullTime => "Full-Time",
        PartTime => "Part-Time",
        TemporarilyNotWorking => "Temporarily Not Working",
        // Older survey extracts spell this status with a comma.
        UnemployedLaidOff => "Unemployed/Laid Off" | "Unemployed, Laid Off",
        Retired => "Retired",
        Housekeeper => "Housekeeper",
        School => "School",
        Other => "Other",
    }
}

pub fn clamp_age(age: i64) -> i64 {
    age.clamp(AGE_MIN, AGE_MAX)
}

pub fn clamp_prestige(prestg10: i64) -> i64 {
    prestg10.clamp(PRESTIGE_MIN, PRESTIGE_MAX)
}

pub fn clamp_childs(childs: i64) -> i64 {
    childs.clamp(CHILDS_MIN, CHILDS_MAX)
}

/// The raw answers produced by the input collector for one submission.
///
/// Categorical answers are carried as labels; they are resolved against their
/// closed domains only when the form is converted into a `Respondent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RespondentForm {
    pub age: i64,
    pub gender: String,
    pub educcat: String,
    pub marital: String,
    pub wrkstat: String,
    pub prestg10: i64,
    pub childs: i64,
}

impl Default for RespondentForm {
    /// Numeric defaults are fixed; each categorical field defaults to its first option.
    fn default() -> Self {
        Self {
            age: AGE_DEFAULT,
            gender: Gender::ALL[0].label().to_string(),
            educcat: EducationLevel::ALL[0].label().to_string(),
            marital: MaritalStatus::ALL[0].label().to_string(),
            wrkstat: WorkStatus::ALL[0].label().to_string(),
            prestg10: PRESTIGE_DEFAULT,
            childs: CHILDS_DEFAULT,
        }
    }
}

/// A fully validated respondent: every categorical answer is a domain member
/// and every integer lies inside its field's range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Respondent {
    pub age: i64,
    pub gender: Gender,
    pub education: EducationLevel,
    pub marital: MaritalStatus,
    pub work_status: WorkStatus,
    pub prestige: i64,
    pub childs: i64,
}

impl Respondent {
    /// Resolves the labels of a raw form and clamps its integers.
    pub fn from_form(form: &RespondentForm) -> Result<Self, UnknownCategory> {
        Ok(Self {
            age: clamp_age(form.age),
            gender: form.gender.parse()?,
            education: form.educcat.parse()?,
            marital: form.marital.parse()?,
            work_status: form.wrkstat.parse()?,
            prestige: clamp_prestige(form.prestg10),
            childs: clamp_childs(form.childs),
        })
    }

    /// The raw form that would produce this respondent.
    pub fn to_form(&self) -> RespondentForm {
        RespondentForm {
            age: self.age,
            gender: self.gender.label().to_string(),
            educcat: self.education.label().to_string(),
            marital: self.marital.label().to_string(),
            wrkstat: self.work_status.label().to_string(),
            prestg10: self.prestige,
            childs: self.childs,
        }
    }
}

//! # Feature Derivation
//!
//! Maps one respondent onto the fixed 13-column row the income model was trained on.
//! The mapping is a pure function: no I/O, no randomness, and identical answers always
//! produce an identical `FeatureRecord`.
//!
//! Marital status is one-hot encoded with `Divorced` as the reference category, so a
//! divorced respondent has all four marital indicators set to zero. The model artifact
//! only checks column names, so this encoding must match how the model was trained.

use crate::survey::{
    EducationLevel, Gender, MaritalStatus, Respondent, RespondentForm, UnknownCategory,
    WorkStatus,
};
use ndarray::Array1;
use thiserror::Error;

/// Number of columns in a feature row.
pub const NUM_FEATURES: usize = 13;

/// Column names in the canonical training order.
pub const FEATURE_NAMES: [&str; NUM_FEATURES] = [
    "prestg10",
    "education_num",
    "is_male",
    "childs",
    "age",
    "experience_squared",
    "work_experience",
    "age_squared",
    "marital_Married",
    "is_employed",
    "marital_Never Married",
    "marital_Widowed",
    "marital_Separated",
];

/// Assumed age at school entry; working life starts at `education_num + SCHOOL_START_AGE`.
const SCHOOL_START_AGE: i64 = 6;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeatureError {
    /// A categorical answer outside its closed domain reached the deriver. The
    /// collector only offers domain members, so this indicates a wiring problem.
    #[error("Configuration error: {0}")]
    Configuration(#[from] UnknownCategory),
}

/// One model input row. Every field is an integer or a 0/1 indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeatureRecord {
    pub prestg10: i64,
    pub education_num: i64,
    pub is_male: i64,
    pub childs: i64,
    pub age: i64,
    pub experience_squared: i64,
    pub work_experience: i64,
    pub age_squared: i64,
    pub marital_married: i64,
    pub is_employed: i64,
    pub marital_never_married: i64,
    pub marital_widowed: i64,
    pub marital_separated: i64,
}

impl FeatureRecord {
    /// Values in the order of `FEATURE_NAMES`.
    pub fn values(&self) -> [i64; NUM_FEATURES] {
        [
            self.prestg10,
            self.education_num,
            self.is_male,
            self.childs,
            self.age,
            self.experience_squared,
            self.work_experience,
            self.age_squared,
            self.marital_married,
            self.is_employed,
            self.marital_never_married,
            self.marital_widowed,
            self.marital_separated,
        ]
    }

    /// Looks up a value by its column name.
    pub fn get(&self, name: &str) -> Option<i64> {
        FEATURE_NAMES
            .iter()
            .position(|&n| n == name)
            .map(|i| self.values()[i])
    }

    /// `(name, value)` pairs in canonical order.
    pub fn named_values(&self) -> impl Iterator<Item = (&'static str, i64)> {
        FEATURE_NAMES.into_iter().zip(self.values())
    }

    /// The row as `f64`, ordered by `columns`. Returns `None` for an unknown column.
    pub fn to_array_in(&self, columns: &[String]) -> Option<Array1<f64>> {
        columns
            .iter()
            .map(|c| self.get(c).map(|v| v as f64))
            .collect::<Option<Vec<f64>>>()
            .map(Array1::from_vec)
    }

    /// The row as `f64` in canonical order.
    pub fn to_array(&self) -> Array1<f64> {
        self.values().iter().map(|&v| v as f64).collect()
    }
}

impl EducationLevel {
    /// Approximate years of schooling for each education category.
    pub fn years(self) -> i64 {
        match self {
            EducationLevel::LessThanHighSchool => 10,
            EducationLevel::HighSchool => 12,
            EducationLevel::JuniorCollege => 14,
            EducationLevel::Bachelor => 16,
            EducationLevel::Graduate => 18,
        }
    }
}

impl WorkStatus {
    /// Full-time, part-time and temporarily absent respondents count as employed.
    pub fn is_employed(self) -> bool {
        matches!(
            self,
            WorkStatus::FullTime | WorkStatus::PartTime | WorkStatus::TemporarilyNotWorking
        )
    }
}

fn indicator(flag: bool) -> i64 {
    i64::from(flag)
}

impl Respondent {
    /// Derives the model input row for this respondent.
    pub fn features(&self) -> FeatureRecord {
        let education_num = self.education.years();
        let work_experience = (self.age - (education_num + SCHOOL_START_AGE)).max(0);

        FeatureRecord {
            prestg10: self.prestige,
            education_num,
            is_male: indicator(self.gender == Gender::Male),
            childs: self.childs,
            age: self.age,
            experience_squared: work_experience * work_experience,
            work_experience,
            age_squared: self.age * self.age,
            marital_married: indicator(self.marital == MaritalStatus::Married),
            is_employed: indicator(self.work_status.is_employed()),
            marital_never_married: indicator(self.marital == MaritalStatus::NeverMarried),
            marital_widowed: indicator(self.marital == MaritalStatus::Widowed),
            marital_separated: indicator(self.marital == MaritalStatus::Separated),
        }
    }
}

/// Derives the feature row for a raw form submission.
///
/// Fails with `FeatureError::Configuration` if a categorical label is not a member of
/// its domain. Integer answers are clamped into range first, as the collector would.
pub fn derive(form: &RespondentForm) -> Result<FeatureRecord, FeatureError> {
    let respondent = Respondent::from_form(form)?;
    Ok(respondent.features())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(age: i64, educcat: &str, marital: &str, wrkstat: &str) -> RespondentForm {
        RespondentForm {
            age,
            educcat: educcat.to_string(),
            marital: marital.to_string(),
            wrkstat: wrkstat.to_string(),
            ..RespondentForm::default()
        }
    }

    #[test]
    fn reference_respondent_produces_expected_record() {
        let form = RespondentForm {
            age: 35,
            gender: "Male".to_string(),
            educcat: "Bachelor".to_string(),
            marital: "Married".to_string(),
            wrkstat: "Full-Time".to_string(),
            prestg10: 45,
            childs: 2,
        };
        let record = derive(&form).unwrap();

        assert_eq!(
            record,
            FeatureRecord {
                prestg10: 45,
                education_num: 16,
                is_male: 1,
                childs: 2,
                age: 35,
                experience_squared: 169,
                work_experience: 13,
                age_squared: 1225,
                marital_married: 1,
                is_employed: 1,
                marital_never_married: 0,
                marital_widowed: 0,
                marital_separated: 0,
            }
        );
    }

    #[test]
    fn education_table_is_exact() {
        let expected = [
            ("Less Than High School", 10),
            ("High School", 12),
            ("Junior College", 14),
            ("Bachelor", 16),
            ("Graduate", 18),
        ];
        for (label, years) in expected {
            let record = derive(&form(40, label, "Married", "Full-Time")).unwrap();
            assert_eq!(record.education_num, years, "education_num for {label}");
        }
    }

    #[test]
    fn work_experience_is_floored_at_zero() {
        for level in EducationLevel::ALL {
            for age in 16..=99 {
                let record = derive(&form(age, level.label(), "Married", "Full-Time")).unwrap();
                let expected = (age - record.education_num - 6).max(0);
                assert_eq!(record.work_experience, expected);
                assert_eq!(record.experience_squared, expected * expected);
                assert_eq!(record.age_squared, age * age);
            }
        }

        let young_graduate = derive(&form(20, "Graduate", "Married", "Full-Time")).unwrap();
        assert_eq!(young_graduate.work_experience, 0);
        assert_eq!(young_graduate.experience_squared, 0);
    }

    #[test]
    fn marital_indicators_are_one_hot_with_divorced_reference() {
        for status in MaritalStatus::ALL {
            let record = derive(&form(35, "Bachelor", status.label(), "Full-Time")).unwrap();
            let indicators = [
                record.marital_married,
                record.marital_never_married,
                record.marital_widowed,
                record.marital_separated,
            ];
            let total: i64 = indicators.iter().sum();
            if *status == MaritalStatus::Divorced {
                assert_eq!(indicators, [0, 0, 0, 0]);
            } else {
                assert_eq!(total, 1, "exactly one indicator set for {status}");
            }
        }

        let separated = derive(&form(35, "Bachelor", "Separated", "Full-Time")).unwrap();
        assert_eq!(separated.marital_separated, 1);
    }

    #[test]
    fn employment_indicator_follows_status_membership() {
        let employed = ["Full-Time", "Part-Time", "Temporarily Not Working"];
        for status in WorkStatus::ALL {
            let record = derive(&form(35, "Bachelor", "Married", status.label())).unwrap();
            let expected = indicator(employed.contains(&status.label()));
            assert_eq!(record.is_employed, expected, "is_employed for {status}");
        }
        let retired = derive(&form(70, "Bachelor", "Married", "Retired")).unwrap();
        assert_eq!(retired.is_employed, 0);
    }

    #[test]
    fn gender_maps_to_is_male() {
        let mut female = RespondentForm::default();
        female.gender = "Female".to_string();
        assert_eq!(derive(&female).unwrap().is_male, 0);
        assert_eq!(derive(&RespondentForm::default()).unwrap().is_male, 1);
    }

    #[test]
    fn derivation_is_deterministic() {
        let form = form(58, "Junior College", "Widowed", "Part-Time");
        assert_eq!(derive(&form).unwrap(), derive(&form).unwrap());
    }

    #[test]
    fn unknown_education_is_a_configuration_error() {
        let err = derive(&form(35, "Doctorate", "Married", "Full-Time")).unwrap_err();
        let FeatureError::Configuration(inner) = err;
        assert_eq!(inner.field, "educcat");
        assert_eq!(inner.value, "Doctorate");
    }

    #[test]
    fn named_access_matches_canonical_order() {
        let record = derive(&RespondentForm::default()).unwrap();
        assert_eq!(record.get("age"), Some(35));
        assert_eq!(record.get("marital_Never Married"), Some(0));
        assert_eq!(record.get("income"), None);

        let names: Vec<_> = record.named_values().map(|(n, _)| n).collect();
        assert_eq!(names, FEATURE_NAMES.to_vec());
        assert_eq!(record.to_array().len(), NUM_FEATURES);
    }

    #[test]
    fn array_can_be_reordered_by_column_names() {
        let record = derive(&RespondentForm::default()).unwrap();
        let columns = vec!["age".to_string(), "prestg10".to_string()];
        let row = record.to_array_in(&columns).unwrap();
        assert_eq!(row.to_vec(), vec![35.0, 45.0]);

        let unknown = vec!["age".to_string(), "income".to_string()];
        assert!(record.to_array_in(&unknown).is_none());
    }
}

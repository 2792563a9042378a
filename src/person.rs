use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BankError, Result};

pub const NATIONAL_ID_LENGTH: usize = 14;
pub const MIN_AGE: u32 = 18;
pub const MAX_AGE: u32 = 100;

const NATIONAL_ID_MIN: u64 = 10u64.pow(NATIONAL_ID_LENGTH as u32 - 1);
const NATIONAL_ID_MAX: u64 = 10u64.pow(NATIONAL_ID_LENGTH as u32) - 1;

/// A national ID that is known to have exactly [`NATIONAL_ID_LENGTH`] digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct NationalId(u64);

impl NationalId {
    pub fn new(value: u64) -> Result<Self> {
        if (NATIONAL_ID_MIN..=NATIONAL_ID_MAX).contains(&value) {
            Ok(NationalId(value))
        } else {
            Err(BankError::InvalidNationalId)
        }
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl TryFrom<u64> for NationalId {
    type Error = BankError;

    fn try_from(value: u64) -> Result<Self> {
        NationalId::new(value)
    }
}

impl From<NationalId> for u64 {
    fn from(id: NationalId) -> u64 {
        id.0
    }
}

impl fmt::Display for NationalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Flat shape of a person as stored in the persons file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonRecord {
    pub national_id: u64,
    pub name: String,
    pub age: u32,
    pub phone_number: String,
}

/// A bank client. Every field is validated on the way in, so a `Person`
/// value is always complete and valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PersonRecord", into = "PersonRecord")]
pub struct Person {
    national_id: NationalId,
    name: String,
    age: u32,
    phone_number: String,
}

pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() || name.contains(',') {
        return Err(BankError::EmptyName);
    }
    Ok(())
}

pub fn validate_phone_number(phone_number: &str) -> Result<()> {
    if phone_number.trim().is_empty() || phone_number.contains(',') {
        return Err(BankError::EmptyPhoneNumber);
    }
    Ok(())
}

pub fn validate_age(age: u32) -> Result<()> {
    if !(MIN_AGE..=MAX_AGE).contains(&age) {
        return Err(BankError::InvalidAge);
    }
    Ok(())
}

impl Person {
    pub fn new(
        national_id: u64,
        name: impl Into<String>,
        age: u32,
        phone_number: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        let phone_number = phone_number.into();
        let national_id = NationalId::new(national_id)?;
        validate_name(&name)?;
        validate_age(age)?;
        validate_phone_number(&phone_number)?;
        Ok(Person {
            national_id,
            name,
            age,
            phone_number,
        })
    }

    pub fn national_id(&self) -> NationalId {
        self.national_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn phone_number(&self) -> &str {
        &self.phone_number
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        validate_name(&name)?;
        self.name = name;
        Ok(())
    }

    pub fn set_age(&mut self, age: u32) -> Result<()> {
        validate_age(age)?;
        self.age = age;
        Ok(())
    }

    pub fn set_phone_number(&mut self, phone_number: impl Into<String>) -> Result<()> {
        let phone_number = phone_number.into();
        validate_phone_number(&phone_number)?;
        self.phone_number = phone_number;
        Ok(())
    }
}

impl TryFrom<PersonRecord> for Person {
    type Error = BankError;

    fn try_from(record: PersonRecord) -> Result<Self> {
        Person::new(record.national_id, record.name, record.age, record.phone_number)
    }
}

impl From<Person> for PersonRecord {
    fn from(person: Person) -> PersonRecord {
        PersonRecord {
            national_id: person.national_id.value(),
            name: person.name,
            age: person.age,
            phone_number: person.phone_number,
        }
    }
}

// Persons are ordered by national ID alone; this is the key binary search runs on.
impl PartialOrd for Person {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Person {
    fn cmp(&self, other: &Self) -> Ordering {
        self.national_id.cmp(&other.national_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: u64 = 29_001_011_234_567;

    #[test]
    fn test_new_valid_person() {
        let person = Person::new(ID, "Ahmed Ali", 30, "01001234567").unwrap();
        assert_eq!(person.national_id().value(), ID);
        assert_eq!(person.name(), "Ahmed Ali");
        assert_eq!(person.age(), 30);
        assert_eq!(person.phone_number(), "01001234567");
    }

    #[test]
    fn test_national_id_must_have_fourteen_digits() {
        assert!(matches!(NationalId::new(1_234_567_890_123), Err(BankError::InvalidNationalId)));
        assert!(matches!(NationalId::new(123_456_789_012_345), Err(BankError::InvalidNationalId)));
        assert!(matches!(NationalId::new(0), Err(BankError::InvalidNationalId)));
        assert!(NationalId::new(10_000_000_000_000).is_ok());
        assert!(NationalId::new(99_999_999_999_999).is_ok());
    }

    #[test]
    fn test_age_bounds() {
        assert!(matches!(Person::new(ID, "A", 17, "1"), Err(BankError::InvalidAge)));
        assert!(matches!(Person::new(ID, "A", 101, "1"), Err(BankError::InvalidAge)));
        assert!(Person::new(ID, "A", MIN_AGE, "1").is_ok());
        assert!(Person::new(ID, "A", MAX_AGE, "1").is_ok());
    }

    #[test]
    fn test_name_and_phone_reject_empty_and_commas() {
        assert!(matches!(Person::new(ID, "", 30, "1"), Err(BankError::EmptyName)));
        assert!(matches!(Person::new(ID, "Ali, Sr", 30, "1"), Err(BankError::EmptyName)));
        assert!(matches!(Person::new(ID, "Ali", 30, ""), Err(BankError::EmptyPhoneNumber)));
        assert!(matches!(Person::new(ID, "Ali", 30, "1,2"), Err(BankError::EmptyPhoneNumber)));
        assert!(matches!(Person::new(ID, "   ", 30, "1"), Err(BankError::EmptyName)));
        assert!(matches!(Person::new(ID, "Ali", 30, " \t"), Err(BankError::EmptyPhoneNumber)));
    }

    #[test]
    fn test_failed_setter_leaves_state_untouched() {
        let mut person = Person::new(ID, "Mona", 40, "0123").unwrap();
        assert!(person.set_age(5).is_err());
        assert!(person.set_name("").is_err());
        assert!(person.set_phone_number("a,b").is_err());
        assert_eq!(person, Person::new(ID, "Mona", 40, "0123").unwrap());

        person.set_age(41).unwrap();
        assert_eq!(person.age(), 41);
    }

    #[test]
    fn test_ordering_uses_national_id_only() {
        let a = Person::new(ID, "Zed", 99, "9").unwrap();
        let b = Person::new(ID + 1, "Amy", 18, "1").unwrap();
        assert!(a < b);
        assert_ne!(a, Person::new(ID, "Other", 99, "9").unwrap());
    }

    #[test]
    fn test_record_conversion_validates() {
        let record = PersonRecord {
            national_id: 42,
            name: "X".to_string(),
            age: 30,
            phone_number: "1".to_string(),
        };
        assert!(matches!(Person::try_from(record), Err(BankError::InvalidNationalId)));
    }
}

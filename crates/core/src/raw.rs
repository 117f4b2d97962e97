//! Wire-level value slots, as collected by the parser before any declaration
//! is consulted.

use serde::Serialize;

use crate::error::RibError;
use crate::types::BasicType;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RawValues {
    /// An array that has not received a value yet.
    Empty,
    Integers(Vec<i32>),
    Floats(Vec<f32>),
    Strings(Vec<String>),
}

/// One decoded value slot: a scalar or a bracketed array.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawParameter {
    pub values: RawValues,
    pub is_array: bool,
    pub line: u32,
}

impl RawParameter {
    pub fn array(line: u32) -> Self {
        RawParameter {
            values: RawValues::Empty,
            is_array: true,
            line,
        }
    }

    pub fn int(value: i32, line: u32) -> Self {
        RawParameter {
            values: RawValues::Integers(vec![value]),
            is_array: false,
            line,
        }
    }

    pub fn float(value: f32, line: u32) -> Self {
        RawParameter {
            values: RawValues::Floats(vec![value]),
            is_array: false,
            line,
        }
    }

    pub fn string(value: impl Into<String>, line: u32) -> Self {
        RawParameter {
            values: RawValues::Strings(vec![value.into()]),
            is_array: false,
            line,
        }
    }

    pub fn floats(values: Vec<f32>, line: u32) -> Self {
        RawParameter {
            values: RawValues::Floats(values),
            is_array: true,
            line,
        }
    }

    /// Basic type of the slot. Untyped (empty) arrays count as float.
    pub fn basic_type(&self) -> BasicType {
        match self.values {
            RawValues::Integers(_) => BasicType::Integer,
            RawValues::Empty | RawValues::Floats(_) => BasicType::Float,
            RawValues::Strings(_) => BasicType::String,
        }
    }

    pub fn len(&self) -> usize {
        match &self.values {
            RawValues::Empty => 0,
            RawValues::Integers(v) => v.len(),
            RawValues::Floats(v) => v.len(),
            RawValues::Strings(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push_int(&mut self, value: i32) -> Result<(), RibError> {
        match &mut self.values {
            RawValues::Empty => self.values = RawValues::Integers(vec![value]),
            RawValues::Integers(v) => v.push(value),
            RawValues::Floats(v) => v.push(value as f32),
            RawValues::Strings(_) => return Err(self.mixed()),
        }
        Ok(())
    }

    pub fn push_float(&mut self, value: f32) -> Result<(), RibError> {
        match &mut self.values {
            RawValues::Empty => self.values = RawValues::Floats(vec![value]),
            RawValues::Integers(v) => {
                let mut promoted: Vec<f32> = v.iter().map(|&i| i as f32).collect();
                promoted.push(value);
                self.values = RawValues::Floats(promoted);
            }
            RawValues::Floats(v) => v.push(value),
            RawValues::Strings(_) => return Err(self.mixed()),
        }
        Ok(())
    }

    pub fn push_floats(&mut self, values: &[f32]) -> Result<(), RibError> {
        for &f in values {
            self.push_float(f)?;
        }
        Ok(())
    }

    pub fn push_string(&mut self, value: String) -> Result<(), RibError> {
        match &mut self.values {
            RawValues::Empty => self.values = RawValues::Strings(vec![value]),
            RawValues::Strings(v) => v.push(value),
            RawValues::Integers(_) | RawValues::Floats(_) => return Err(self.mixed()),
        }
        Ok(())
    }

    fn mixed(&self) -> RibError {
        RibError::syntax(self.line, "array mixes strings with numbers")
    }

    /// The slot as floats, promoting integers. `None` for strings.
    pub fn as_floats(&self) -> Option<Vec<f32>> {
        match &self.values {
            RawValues::Empty => Some(Vec::new()),
            RawValues::Integers(v) => Some(v.iter().map(|&i| i as f32).collect()),
            RawValues::Floats(v) => Some(v.clone()),
            RawValues::Strings(_) => None,
        }
    }

    /// The slot as integers. Floats qualify only when every value is integral.
    pub fn as_ints(&self) -> Option<Vec<i32>> {
        match &self.values {
            RawValues::Empty => Some(Vec::new()),
            RawValues::Integers(v) => Some(v.clone()),
            RawValues::Floats(v) => v
                .iter()
                .map(|&f| {
                    if f.fract() == 0.0 && (-2147483648.0..2147483648.0).contains(&f) {
                        Some(f as i32)
                    } else {
                        None
                    }
                })
                .collect(),
            RawValues::Strings(_) => None,
        }
    }

    pub fn as_strings(&self) -> Option<&[String]> {
        match &self.values {
            RawValues::Strings(v) => Some(v),
            RawValues::Empty => Some(&[]),
            _ => None,
        }
    }

    /// Single string value of a scalar (or one-element array) slot.
    pub fn as_str(&self) -> Option<&str> {
        match &self.values {
            RawValues::Strings(v) if v.len() == 1 => Some(&v[0]),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_array_promotes_on_first_float() {
        let mut p = RawParameter::array(1);
        p.push_int(1).unwrap();
        p.push_int(2).unwrap();
        assert_eq!(p.basic_type(), BasicType::Integer);
        p.push_float(0.5).unwrap();
        assert_eq!(p.values, RawValues::Floats(vec![1.0, 2.0, 0.5]));
        p.push_int(3).unwrap();
        assert_eq!(p.values, RawValues::Floats(vec![1.0, 2.0, 0.5, 3.0]));
    }

    #[test]
    fn strings_never_mix_with_numbers() {
        let mut p = RawParameter::array(7);
        p.push_string("a".into()).unwrap();
        let err = p.push_float(1.0).unwrap_err();
        assert_eq!(err.line(), 7);
        let mut q = RawParameter::array(7);
        q.push_int(1).unwrap();
        assert!(q.push_string("a".into()).is_err());
    }

    #[test]
    fn empty_arrays_default_to_float() {
        let p = RawParameter::array(1);
        assert_eq!(p.basic_type(), BasicType::Float);
        assert!(p.is_empty());
    }

    #[test]
    fn integral_floats_convert_to_ints() {
        assert_eq!(
            RawParameter::floats(vec![1.0, 4.0], 1).as_ints(),
            Some(vec![1, 4])
        );
        assert_eq!(RawParameter::floats(vec![1.5], 1).as_ints(), None);
    }

    #[test]
    fn out_of_range_floats_do_not_saturate() {
        assert_eq!(RawParameter::floats(vec![2147483648.0], 1).as_ints(), None);
        assert_eq!(
            RawParameter::floats(vec![-2147483648.0], 1).as_ints(),
            Some(vec![i32::MIN])
        );
        assert_eq!(RawParameter::floats(vec![1e10], 1).as_ints(), None);
    }
}

use serde::Serialize;
use std::collections::HashMap;

use crate::error::{InvalidField, ValidationError};

/// Declared numeric type of a form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Float,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::Integer => "an integer",
            FieldKind::Float => "a number",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

const fn int(name: &'static str) -> FieldSpec {
    FieldSpec { name, kind: FieldKind::Integer }
}

const fn float(name: &'static str) -> FieldSpec {
    FieldSpec { name, kind: FieldKind::Float }
}

/// Input schema, in the column order the model was trained on.
pub const FIELDS: [FieldSpec; 12] = [
    int("X"),
    int("Y"),
    int("month"),
    int("day"),
    float("FFMC"),
    float("DMC"),
    float("DC"),
    float("ISI"),
    float("temp"),
    int("RH"),
    float("wind"),
    float("rain"),
];

#[derive(Debug, Clone, Copy, PartialEq)]
enum Parsed {
    Int(i64),
    Float(f64),
}

impl Parsed {
    fn int(self) -> i64 {
        match self {
            Parsed::Int(v) => v,
            Parsed::Float(v) => v as i64,
        }
    }

    fn float(self) -> f64 {
        match self {
            Parsed::Int(v) => v as f64,
            Parsed::Float(v) => v,
        }
    }
}

/// One fire-risk observation. Built per request, never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionInput {
    pub x: i64,
    pub y: i64,
    pub month: i64,
    pub day: i64,
    pub ffmc: f64,
    pub dmc: f64,
    pub dc: f64,
    pub isi: f64,
    pub temp: f64,
    pub rh: i64,
    pub wind: f64,
    pub rain: f64,
}

impl PredictionInput {
    /// Parse all twelve fields in one pass over [`FIELDS`].
    ///
    /// Missing and unparsable fields are collected together, so the caller
    /// gets the complete list rather than the first failure.
    pub fn from_fields(fields: &HashMap<String, String>) -> Result<Self, ValidationError> {
        let mut missing = Vec::new();
        let mut invalid = Vec::new();
        let mut values = [Parsed::Int(0); 12];

        for (slot, spec) in values.iter_mut().zip(FIELDS.iter()) {
            let Some(raw) = fields.get(spec.name) else {
                missing.push(spec.name);
                continue;
            };
            match parse_value(raw, spec.kind) {
                Some(v) => *slot = v,
                None => invalid.push(InvalidField {
                    name: spec.name,
                    value: raw.clone(),
                    expected: spec.kind,
                }),
            }
        }

        if !missing.is_empty() || !invalid.is_empty() {
            return Err(ValidationError { missing, invalid });
        }

        Ok(Self {
            x: values[0].int(),
            y: values[1].int(),
            month: values[2].int(),
            day: values[3].int(),
            ffmc: values[4].float(),
            dmc: values[5].float(),
            dc: values[6].float(),
            isi: values[7].float(),
            temp: values[8].float(),
            rh: values[9].int(),
            wind: values[10].float(),
            rain: values[11].float(),
        })
    }

    /// Parse decoded form pairs. A repeated key keeps its first value.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Result<Self, ValidationError> {
        let mut fields = HashMap::with_capacity(pairs.len());
        for (k, v) in pairs {
            fields.entry(k).or_insert(v);
        }
        Self::from_fields(&fields)
    }

    /// Same as [`from_fields`](Self::from_fields) but for a JSON object.
    /// Numbers and numeric strings are accepted; other JSON types are invalid.
    pub fn from_json(obj: &serde_json::Map<String, serde_json::Value>) -> Result<Self, ValidationError> {
        let fields = obj
            .iter()
            .map(|(k, v)| {
                let text = match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), text)
            })
            .collect();
        Self::from_fields(&fields)
    }

    /// Named features in schema order. Integers widen to f64 exactly.
    pub fn named_features(&self) -> [(&'static str, f64); 12] {
        [
            ("X", self.x as f64),
            ("Y", self.y as f64),
            ("month", self.month as f64),
            ("day", self.day as f64),
            ("FFMC", self.ffmc),
            ("DMC", self.dmc),
            ("DC", self.dc),
            ("ISI", self.isi),
            ("temp", self.temp),
            ("RH", self.rh as f64),
            ("wind", self.wind),
            ("rain", self.rain),
        ]
    }
}

fn parse_value(raw: &str, kind: FieldKind) -> Option<Parsed> {
    let s = raw.trim();
    match kind {
        FieldKind::Integer => s.parse::<i64>().ok().map(Parsed::Int),
        FieldKind::Float => s.parse::<f64>().ok().map(Parsed::Float),
    }
}

/// JSON body of a successful `/api/predict` call.
#[derive(Debug, Serialize, Clone, Copy)]
pub struct PredictionOut {
    pub prediction: f64,
}

//! Interactive product form.

use colored::Colorize;
use prodstore_protocol::{Coordinates, NewProduct, UnitOfMeasure};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use std::str::FromStr;

type LineEditor = Editor<(), DefaultHistory>;

/// Prompts for every product field. Returns `None` if the user cancels
/// with Ctrl+C or Ctrl+D.
pub fn read_product(editor: &mut LineEditor) -> Result<Option<NewProduct>, ReadlineError> {
    match fill(editor) {
        Ok(product) => Ok(Some(product)),
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
        Err(e) => Err(e),
    }
}

fn fill(editor: &mut LineEditor) -> Result<NewProduct, ReadlineError> {
    let name = ask(editor, "name", |s| non_empty(s, "name"))?;
    let x = ask(editor, "coordinates.x", parse_finite)?;
    let y = ask(editor, "coordinates.y", parse::<i64>)?;
    let price = ask(editor, "price", |s| {
        let price = parse_finite(s)?;
        if price <= 0.0 {
            return Err("price must be greater than 0".to_string());
        }
        Ok(price)
    })?;
    let part_number = ask(editor, "part number", |s| non_empty(s, "part number"))?;
    let manufacture_cost = ask(editor, "manufacture cost (empty to skip)", |s| {
        optional(s, parse_finite)
    })?;
    let units: Vec<&str> = UnitOfMeasure::ALL.iter().map(|u| u.as_str()).collect();
    let unit_prompt = format!("unit of measure [{}] (empty to skip)", units.join(", "));
    let unit_of_measure = ask(editor, &unit_prompt, |s| {
        optional(s, |s| {
            UnitOfMeasure::parse(s).ok_or_else(|| format!("unknown unit '{s}'"))
        })
    })?;

    Ok(NewProduct {
        name,
        coordinates: Coordinates { x, y },
        price,
        part_number,
        manufacture_cost,
        unit_of_measure,
    })
}

/// Asks until `parse` accepts the answer.
fn ask<T>(
    editor: &mut LineEditor,
    field: &str,
    parse: impl Fn(&str) -> Result<T, String>,
) -> Result<T, ReadlineError> {
    loop {
        let line = editor.readline(&format!("  {}: ", field.cyan()))?;
        match parse(line.trim()) {
            Ok(value) => return Ok(value),
            Err(msg) => println!("  {}: {}", "Invalid".red(), msg),
        }
    }
}

fn non_empty(value: &str, field: &str) -> Result<String, String> {
    if value.is_empty() {
        return Err(format!("{field} must not be empty"));
    }
    Ok(value.to_string())
}

fn parse<T: FromStr>(value: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("'{value}' is not a valid number"))
}

fn parse_finite(value: &str) -> Result<f64, String> {
    let n: f64 = parse(value)?;
    if !n.is_finite() {
        return Err("value must be finite".to_string());
    }
    Ok(n)
}

fn optional<T>(
    value: &str,
    parse: impl Fn(&str) -> Result<T, String>,
) -> Result<Option<T>, String> {
    if value.is_empty() {
        return Ok(None);
    }
    parse(value).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_finite() {
        assert_eq!(parse_finite("2.5"), Ok(2.5));
        assert!(parse_finite("abc").is_err());
        assert!(parse_finite("inf").is_err());
        assert!(parse_finite("NaN").is_err());
    }

    #[test]
    fn test_optional() {
        assert_eq!(optional("", parse_finite), Ok(None));
        assert_eq!(optional("1.5", parse_finite), Ok(Some(1.5)));
        assert!(optional("x", parse_finite).is_err());
    }

    #[test]
    fn test_non_empty() {
        assert!(non_empty("", "name").is_err());
        assert_eq!(non_empty("Bolt", "name"), Ok("Bolt".to_string()));
    }
}

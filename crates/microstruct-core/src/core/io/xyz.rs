use crate::core::io::traits::DataFile;
use crate::core::models::cell::{CellError, SimulationCell};
use crate::core::models::particles::ParticleData;
use crate::core::models::property::{ParticleProperty, PropertyDataType, PropertyError};
use nalgebra::{Matrix3, Point3, Vector3};
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum XyzError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("Missing 'Lattice' entry in the comment line")]
    MissingLattice,
    #[error("Missing 'pos:R:3' column in the Properties specification")]
    MissingPositions,
    #[error("Invalid simulation cell: {0}")]
    Cell(#[from] CellError),
    #[error("Invalid particle property: {0}")]
    Property(#[from] PropertyError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Str,
    Real,
    Int,
    Logical,
}

#[derive(Debug, Clone)]
struct Column {
    name: String,
    kind: ColumnKind,
    count: usize,
}

/// Extended XYZ particle files.
///
/// The comment line carries `key=value` pairs; `Lattice` (nine numbers, the three
/// cell vectors) and `Properties` (`name:type:count` triples) are required.
/// `pbc` defaults to fully periodic and `Origin` to the coordinate origin.
/// Real, integer and logical columns become particle properties; a string
/// `species` column is converted into an integer type property in order of
/// first appearance.
pub struct XyzFile;

impl DataFile for XyzFile {
    type Data = ParticleData;
    type Error = XyzError;

    fn read_from(reader: &mut impl BufRead) -> Result<ParticleData, XyzError> {
        let mut lines = reader.lines().enumerate();

        let (_, count_line) = lines.next().ok_or_else(|| parse_error(1, "file is empty"))?;
        let count_line = count_line?;
        let count: usize = count_line
            .trim()
            .parse()
            .map_err(|_| parse_error(1, format!("invalid particle count '{}'", count_line.trim())))?;

        let (_, comment) = lines
            .next()
            .ok_or_else(|| parse_error(2, "missing comment line"))?;
        let header = parse_key_values(&comment?);

        let lattice = header.get("lattice").ok_or(XyzError::MissingLattice)?;
        let matrix = parse_lattice(lattice)?;
        let origin = match header.get("origin") {
            Some(value) => {
                let v = parse_floats(value, 2)?;
                if v.len() != 3 {
                    return Err(parse_error(2, "Origin must have three components"));
                }
                Point3::new(v[0], v[1], v[2])
            }
            None => Point3::origin(),
        };
        let pbc = match header.get("pbc") {
            Some(value) => parse_pbc(value)?,
            None => [true; 3],
        };
        let cell = SimulationCell::new(matrix, origin, pbc)?;

        let columns = parse_columns(
            header
                .get("properties")
                .map(String::as_str)
                .unwrap_or("species:S:1:pos:R:3"),
        )?;
        if !columns
            .iter()
            .any(|c| c.name == "pos" && c.kind == ColumnKind::Real && c.count == 3)
        {
            return Err(XyzError::MissingPositions);
        }

        let mut positions = Vec::with_capacity(count);
        let mut reals: Vec<Vec<f64>> = vec![Vec::new(); columns.len()];
        let mut ints: Vec<Vec<i32>> = vec![Vec::new(); columns.len()];
        let mut species_ids: HashMap<String, i32> = HashMap::new();
        let mut species: Vec<i32> = Vec::new();

        for _ in 0..count {
            let (index, line) = lines
                .next()
                .ok_or_else(|| parse_error(count + 2, "unexpected end of file"))?;
            let line_no = index + 1;
            let line = line?;
            let mut tokens = line.split_whitespace();

            for (c, column) in columns.iter().enumerate() {
                for _ in 0..column.count {
                    let token = tokens
                        .next()
                        .ok_or_else(|| parse_error(line_no, "too few columns"))?;
                    match column.kind {
                        ColumnKind::Real => reals[c].push(parse_float(token, line_no)?),
                        ColumnKind::Int => ints[c].push(token.parse().map_err(|_| {
                            parse_error(line_no, format!("invalid integer '{token}'"))
                        })?),
                        ColumnKind::Logical => ints[c].push(parse_logical(token, line_no)?),
                        ColumnKind::Str => {
                            if column.name == "species" {
                                let next_id = species_ids.len() as i32 + 1;
                                species.push(*species_ids.entry(token.to_string()).or_insert(next_id));
                            }
                        }
                    }
                }
            }

            let pos_column = columns
                .iter()
                .position(|c| c.name == "pos")
                .ok_or(XyzError::MissingPositions)?;
            let p = &reals[pos_column][reals[pos_column].len() - 3..];
            positions.push(Point3::new(p[0], p[1], p[2]));
        }

        let mut data = ParticleData::new(cell, positions);
        for (c, column) in columns.iter().enumerate() {
            match column.kind {
                ColumnKind::Real if column.name != "pos" => data.insert_property(
                    ParticleProperty::vector_float(&column.name, column.count, std::mem::take(&mut reals[c]))?,
                ),
                ColumnKind::Int | ColumnKind::Logical => data.insert_property(
                    ParticleProperty::vector_int(&column.name, column.count, std::mem::take(&mut ints[c]))?,
                ),
                ColumnKind::Str if column.name == "species" => {
                    data.insert_property(ParticleProperty::scalar_int("species", std::mem::take(&mut species)))
                }
                _ => {}
            }
        }
        Ok(data)
    }

    fn write_to(data: &ParticleData, writer: &mut impl Write) -> Result<(), XyzError> {
        let m = data.cell.matrix();
        let o = data.cell.origin();
        let pbc = data.cell.pbc_flags();
        let flag = |b: bool| if b { "T" } else { "F" };

        let mut spec = String::from("pos:R:3");
        for p in &data.properties {
            let code = match p.data_type() {
                PropertyDataType::Float => "R",
                PropertyDataType::Int => "I",
            };
            spec.push_str(&format!(":{}:{}:{}", p.name(), code, p.component_count()));
        }

        writeln!(writer, "{}", data.particle_count())?;
        writeln!(
            writer,
            "Lattice=\"{} {} {} {} {} {} {} {} {}\" Origin=\"{} {} {}\" pbc=\"{} {} {}\" Properties={}",
            m[(0, 0)],
            m[(1, 0)],
            m[(2, 0)],
            m[(0, 1)],
            m[(1, 1)],
            m[(2, 1)],
            m[(0, 2)],
            m[(1, 2)],
            m[(2, 2)],
            o.x,
            o.y,
            o.z,
            flag(pbc[0]),
            flag(pbc[1]),
            flag(pbc[2]),
            spec
        )?;
        for (i, p) in data.positions.iter().enumerate() {
            write!(writer, "{} {} {}", p.x, p.y, p.z)?;
            for prop in &data.properties {
                for c in 0..prop.component_count() {
                    let v = prop.get(i, c).unwrap_or(0.0);
                    match prop.data_type() {
                        PropertyDataType::Float => write!(writer, " {v}")?,
                        PropertyDataType::Int => write!(writer, " {}", v as i64)?,
                    }
                }
            }
            writeln!(writer)?;
        }
        Ok(())
    }
}

fn parse_error(line: usize, message: impl Into<String>) -> XyzError {
    XyzError::Parse {
        line,
        message: message.into(),
    }
}

/// Splits the comment line into lower-cased keys and unquoted values.
fn parse_key_values(line: &str) -> HashMap<String, String> {
    let mut result = HashMap::new();
    let mut chars = line.chars().peekable();
    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let key: String = std::iter::from_fn(|| chars.next_if(|&c| c != '=' && !c.is_whitespace())).collect();
        if key.is_empty() {
            break;
        }
        if chars.next_if_eq(&'=').is_none() {
            result.insert(key.to_lowercase(), String::new());
            continue;
        }
        let value: String = if chars.next_if_eq(&'"').is_some() {
            let v = std::iter::from_fn(|| chars.next_if(|&c| c != '"')).collect();
            chars.next();
            v
        } else {
            std::iter::from_fn(|| chars.next_if(|c| !c.is_whitespace())).collect()
        };
        result.insert(key.to_lowercase(), value);
    }
    result
}

fn parse_float(token: &str, line: usize) -> Result<f64, XyzError> {
    token
        .parse()
        .map_err(|_| parse_error(line, format!("invalid number '{token}'")))
}

fn parse_floats(value: &str, line: usize) -> Result<Vec<f64>, XyzError> {
    value
        .split_whitespace()
        .map(|t| parse_float(t, line))
        .collect()
}

fn parse_logical(token: &str, line: usize) -> Result<i32, XyzError> {
    match token {
        "T" | "t" | "True" | "true" | "1" => Ok(1),
        "F" | "f" | "False" | "false" | "0" => Ok(0),
        _ => Err(parse_error(line, format!("invalid logical value '{token}'"))),
    }
}

fn parse_lattice(value: &str) -> Result<Matrix3<f64>, XyzError> {
    let v = parse_floats(value, 2)?;
    if v.len() != 9 {
        return Err(parse_error(2, "Lattice must contain nine numbers"));
    }
    Ok(Matrix3::from_columns(&[
        Vector3::new(v[0], v[1], v[2]),
        Vector3::new(v[3], v[4], v[5]),
        Vector3::new(v[6], v[7], v[8]),
    ]))
}

fn parse_pbc(value: &str) -> Result<[bool; 3], XyzError> {
    let flags: Vec<i32> = value
        .split_whitespace()
        .map(|t| parse_logical(t, 2))
        .collect::<Result<_, _>>()?;
    match flags.as_slice() {
        [a, b, c] => Ok([*a == 1, *b == 1, *c == 1]),
        _ => Err(parse_error(2, "pbc must contain three flags")),
    }
}

fn parse_columns(spec: &str) -> Result<Vec<Column>, XyzError> {
    let parts: Vec<&str> = spec.split(':').collect();
    if parts.len() % 3 != 0 {
        return Err(parse_error(2, "Properties must consist of name:type:count triples"));
    }
    parts
        .chunks(3)
        .map(|chunk| {
            let kind = match chunk[1] {
                "S" => ColumnKind::Str,
                "R" => ColumnKind::Real,
                "I" => ColumnKind::Int,
                "L" => ColumnKind::Logical,
                other => return Err(parse_error(2, format!("unknown column type '{other}'"))),
            };
            let count = chunk[2]
                .parse::<usize>()
                .ok()
                .filter(|&n| n > 0)
                .ok_or_else(|| parse_error(2, format!("invalid column count '{}'", chunk[2])))?;
            Ok(Column {
                name: chunk[0].to_string(),
                kind,
                count,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"3
Lattice="10.0 0.0 0.0 0.0 12.0 0.0 1.0 0.0 8.0" Properties=species:S:1:pos:R:3:charge:R:1:selected:L:1 pbc="T T F" Time=3.0
Cu 1.0 2.0 3.0 0.5 T
Ag 4.0 5.0 6.0 -0.5 F
Cu 7.0 8.0 1.0 0.25 T
"#;

    #[test]
    fn reads_cell_positions_and_properties() {
        let data = XyzFile::read_from(&mut Cursor::new(SAMPLE)).unwrap();
        assert_eq!(data.particle_count(), 3);
        assert_eq!(data.positions[1], Point3::new(4.0, 5.0, 6.0));
        assert_eq!(data.cell.pbc_flags(), [true, true, false]);
        assert_eq!(data.cell.edge(2), Vector3::new(1.0, 0.0, 8.0));

        let charge = data.property("charge").unwrap();
        assert_eq!(charge.get(2, 0), Some(0.25));
        let selected = data.property("selected").unwrap();
        assert_eq!(selected.data_type(), PropertyDataType::Int);
        assert_eq!(selected.get(1, 0), Some(0.0));
        let species = data.property("species").unwrap();
        assert_eq!(species.get(0, 0), species.get(2, 0));
        assert_ne!(species.get(0, 0), species.get(1, 0));
    }

    #[test]
    fn missing_lattice_is_an_error() {
        let input = "1\nProperties=pos:R:3\n0 0 0\n";
        assert!(matches!(
            XyzFile::read_from(&mut Cursor::new(input)),
            Err(XyzError::MissingLattice)
        ));
    }

    #[test]
    fn truncated_file_reports_line() {
        let input = "2\nLattice=\"1 0 0 0 1 0 0 0 1\" Properties=pos:R:3\n0 0 0\n";
        assert!(matches!(
            XyzFile::read_from(&mut Cursor::new(input)),
            Err(XyzError::Parse { .. })
        ));
    }

    #[test]
    fn write_then_read_preserves_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("particles.xyz");
        let original = XyzFile::read_from(&mut Cursor::new(SAMPLE)).unwrap();
        XyzFile::write_to_path(&original, &path).unwrap();
        let reread = XyzFile::read_from_path(&path).unwrap();
        assert_eq!(reread.positions, original.positions);
        assert_eq!(reread.cell, original.cell);
        assert_eq!(reread.property("charge"), original.property("charge"));
    }
}

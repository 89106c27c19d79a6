use crate::core::io::traits::DataFile;
use crate::core::mesh::tri_mesh::TriMesh;
use nalgebra::Point3;
use std::io::{self, BufRead, Read, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VtkError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Unsupported VTK dataset: {0}")]
    Unsupported(String),
    #[error("Malformed VTK file: {0}")]
    Malformed(String),
}

/// Polygon soup as stored in a legacy VTK unstructured grid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolygonMesh {
    pub vertices: Vec<Point3<f64>>,
    pub polygons: Vec<Vec<usize>>,
    /// Per-polygon material (or region) index; empty if the file carries none.
    pub materials: Vec<u32>,
}

impl PolygonMesh {
    /// Material of polygon `i`, or 0 if no materials were stored.
    pub fn material(&self, i: usize) -> u32 {
        self.materials.get(i).copied().unwrap_or(0)
    }
}

impl From<&TriMesh> for PolygonMesh {
    fn from(mesh: &TriMesh) -> Self {
        Self {
            vertices: mesh.vertices.clone(),
            polygons: mesh.faces.iter().map(|f| f.vertices.to_vec()).collect(),
            materials: mesh.faces.iter().map(|f| f.material).collect(),
        }
    }
}

/// Legacy ASCII VTK files containing an unstructured grid of polygons.
///
/// The writer emits triangles (cell type 5) or general polygons (cell type 7)
/// followed by a `material` cell scalar.
pub struct VtkFile;

impl DataFile for VtkFile {
    type Data = PolygonMesh;
    type Error = VtkError;

    fn read_from(reader: &mut impl BufRead) -> Result<PolygonMesh, VtkError> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;

        let mut lines = text.lines();
        let magic = lines.next().unwrap_or_default();
        if !magic.starts_with("# vtk DataFile") {
            return Err(VtkError::Malformed("missing '# vtk DataFile' header".into()));
        }
        let _title = lines.next();
        let format = lines.next().unwrap_or_default().trim();
        if !format.eq_ignore_ascii_case("ASCII") {
            return Err(VtkError::Unsupported(format!("format '{format}'")));
        }

        let mut tokens = lines.flat_map(str::split_whitespace);
        let mut mesh = PolygonMesh::default();

        while let Some(keyword) = tokens.next() {
            match keyword.to_ascii_uppercase().as_str() {
                "DATASET" => {
                    let kind = next_token(&mut tokens, "dataset type")?;
                    if !kind.eq_ignore_ascii_case("UNSTRUCTURED_GRID") {
                        return Err(VtkError::Unsupported(kind.to_string()));
                    }
                }
                "POINTS" => {
                    let n: usize = next_parsed(&mut tokens, "point count")?;
                    let _data_type = next_token(&mut tokens, "point data type")?;
                    mesh.vertices.reserve(n);
                    for _ in 0..n {
                        let x = next_parsed(&mut tokens, "point coordinate")?;
                        let y = next_parsed(&mut tokens, "point coordinate")?;
                        let z = next_parsed(&mut tokens, "point coordinate")?;
                        mesh.vertices.push(Point3::new(x, y, z));
                    }
                }
                "CELLS" => {
                    let n: usize = next_parsed(&mut tokens, "cell count")?;
                    let _size: usize = next_parsed(&mut tokens, "cell list size")?;
                    for _ in 0..n {
                        let k: usize = next_parsed(&mut tokens, "cell vertex count")?;
                        let polygon = (0..k)
                            .map(|_| next_parsed::<usize>(&mut tokens, "cell vertex index"))
                            .collect::<Result<Vec<_>, _>>()?;
                        if let Some(&bad) = polygon.iter().find(|&&v| v >= mesh.vertices.len()) {
                            return Err(VtkError::Malformed(format!(
                                "cell references vertex {bad} but only {} points exist",
                                mesh.vertices.len()
                            )));
                        }
                        mesh.polygons.push(polygon);
                    }
                }
                "CELL_TYPES" => {
                    let n: usize = next_parsed(&mut tokens, "cell type count")?;
                    for _ in 0..n {
                        let t: u32 = next_parsed(&mut tokens, "cell type")?;
                        if !matches!(t, 5 | 7) {
                            return Err(VtkError::Unsupported(format!("cell type {t}")));
                        }
                    }
                }
                "CELL_DATA" => {
                    let _n: usize = next_parsed(&mut tokens, "cell data count")?;
                }
                "SCALARS" => {
                    let name = next_token(&mut tokens, "scalar name")?.to_string();
                    let _data_type = next_token(&mut tokens, "scalar type")?;
                    let mut next = next_token(&mut tokens, "LOOKUP_TABLE")?;
                    if next.parse::<usize>().is_ok() {
                        next = next_token(&mut tokens, "LOOKUP_TABLE")?;
                    }
                    if !next.eq_ignore_ascii_case("LOOKUP_TABLE") {
                        return Err(VtkError::Malformed("expected LOOKUP_TABLE".into()));
                    }
                    let _table = next_token(&mut tokens, "lookup table name")?;
                    let values = (0..mesh.polygons.len())
                        .map(|_| next_parsed::<f64>(&mut tokens, "scalar value"))
                        .collect::<Result<Vec<_>, _>>()?;
                    if name == "material" || name == "region" {
                        mesh.materials = values.into_iter().map(|v| v as u32).collect();
                    }
                }
                other => {
                    return Err(VtkError::Unsupported(format!("section '{other}'")));
                }
            }
        }

        Ok(mesh)
    }

    fn write_to(mesh: &PolygonMesh, writer: &mut impl Write) -> Result<(), VtkError> {
        writeln!(writer, "# vtk DataFile Version 3.0")?;
        writeln!(writer, "# Triangle mesh")?;
        writeln!(writer, "ASCII")?;
        writeln!(writer, "DATASET UNSTRUCTURED_GRID")?;
        writeln!(writer, "POINTS {} double", mesh.vertices.len())?;
        for p in &mesh.vertices {
            writeln!(writer, "{} {} {}", p.x, p.y, p.z)?;
        }

        let list_size: usize = mesh.polygons.iter().map(|p| p.len() + 1).sum();
        writeln!(writer, "\nCELLS {} {}", mesh.polygons.len(), list_size)?;
        for polygon in &mesh.polygons {
            write!(writer, "{}", polygon.len())?;
            for v in polygon {
                write!(writer, " {v}")?;
            }
            writeln!(writer)?;
        }

        writeln!(writer, "\nCELL_TYPES {}", mesh.polygons.len())?;
        for polygon in &mesh.polygons {
            writeln!(writer, "{}", if polygon.len() == 3 { 5 } else { 7 })?;
        }

        writeln!(writer, "\nCELL_DATA {}", mesh.polygons.len())?;
        writeln!(writer, "SCALARS material int 1")?;
        writeln!(writer, "LOOKUP_TABLE default")?;
        for i in 0..mesh.polygons.len() {
            writeln!(writer, "{}", mesh.material(i))?;
        }
        Ok(())
    }
}

fn next_token<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    what: &str,
) -> Result<&'a str, VtkError> {
    tokens
        .next()
        .ok_or_else(|| VtkError::Malformed(format!("unexpected end of file, expected {what}")))
}

fn next_parsed<'a, T: std::str::FromStr>(
    tokens: &mut impl Iterator<Item = &'a str>,
    what: &str,
) -> Result<T, VtkError> {
    let token = next_token(tokens, what)?;
    token
        .parse()
        .map_err(|_| VtkError::Malformed(format!("invalid {what} '{token}'")))
}

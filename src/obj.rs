use crate::drawable::MeshData;
use crate::error::ViewerError;

/// Parses a Wavefront OBJ model into a positions-only triangle list.
///
/// Only `v` and `f` records are used; texture and normal references in
/// face corners are accepted and ignored. Polygons are fan-triangulated.
pub fn parse_obj(name: &str, data: &str) -> Result<MeshData, ViewerError> {
    let mut positions = Vec::new();
    let mut polygons: Vec<(usize, Vec<i64>)> = Vec::new();

    for (line_no, line) in data.lines().enumerate() {
        let line_no = line_no + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut parts = trimmed.split_whitespace();
        match parts.next() {
            Some("v") => {
                let vertex = parse_vec3(parts).ok_or_else(|| {
                    ViewerError::invalid_model(name, format!("invalid vertex on line {line_no}"))
                })?;
                positions.extend_from_slice(&vertex);
            }
            Some("f") => {
                let corners = parse_face(parts).ok_or_else(|| {
                    ViewerError::invalid_model(name, format!("invalid face on line {line_no}"))
                })?;
                polygons.push((line_no, corners));
            }
            _ => {}
        }
    }

    let vertex_count = positions.len() / 3;
    if vertex_count == 0 {
        return Err(ViewerError::invalid_model(name, "OBJ file defines no vertices"));
    }

    let mut indices = Vec::new();
    for (line_no, corners) in polygons {
        let resolved = corners
            .iter()
            .map(|&index| resolve_index(index, vertex_count))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                ViewerError::invalid_model(name, format!("vertex index out of range on line {line_no}"))
            })?;
        for i in 1..resolved.len() - 1 {
            indices.extend_from_slice(&[resolved[0], resolved[i], resolved[i + 1]]);
        }
    }
    if indices.is_empty() {
        return Err(ViewerError::invalid_model(name, "OBJ file defines no faces"));
    }

    Ok(MeshData::indexed(positions, indices))
}

fn parse_vec3<'a>(mut parts: impl Iterator<Item = &'a str>) -> Option<[f32; 3]> {
    let mut next = || parts.next()?.parse::<f32>().ok().filter(|value| value.is_finite());
    Some([next()?, next()?, next()?])
}

fn parse_face<'a>(parts: impl Iterator<Item = &'a str>) -> Option<Vec<i64>> {
    let corners = parts
        .map(|corner| corner.split('/').next()?.parse::<i64>().ok())
        .collect::<Option<Vec<_>>>()?;
    (corners.len() >= 3).then_some(corners)
}

/// OBJ indices are one-based; negative values count back from the end.
fn resolve_index(index: i64, len: usize) -> Option<u32> {
    let len = len as i64;
    let zero_based = match index {
        i if i > 0 && i <= len => i - 1,
        i if i < 0 && i >= -len => len + i,
        _ => return None,
    };
    u32::try_from(zero_based).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_triangle() {
        let obj = "\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let mesh = parse_obj("tri.obj", obj).unwrap();
        assert_eq!(mesh.indices, Some(vec![0, 1, 2]));
        assert_eq!(mesh.positions.len(), 9);
    }

    #[test]
    fn triangulates_quads_and_ignores_normals() {
        let obj = "v 0 0 0\nv 1 0 0\nv 1 0 1\nv 0 0 1\nvn 0 1 0\nf 1//1 2//1 3//1 4//1\n";
        let mesh = parse_obj("quad.obj", obj).unwrap();
        assert_eq!(mesh.indices, Some(vec![0, 1, 2, 0, 2, 3]));
    }

    #[test]
    fn supports_negative_indices() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n";
        let mesh = parse_obj("neg.obj", obj).unwrap();
        assert_eq!(mesh.indices, Some(vec![0, 1, 2]));
    }

    #[test]
    fn rejects_out_of_range_faces() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 4\n";
        let err = parse_obj("bad.obj", obj).unwrap_err();
        assert!(err.to_string().contains("line 4"));
    }

    #[test]
    fn rejects_most_negative_index() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -9223372036854775808 1 2\n";
        let err = parse_obj("min.obj", obj).unwrap_err();
        assert!(matches!(err, ViewerError::InvalidModel { .. }));
        assert!(err.to_string().contains("line 4"));
    }

    #[test]
    fn rejects_files_without_geometry() {
        assert!(parse_obj("empty.obj", "# nothing\n").is_err());
        assert!(parse_obj("points.obj", "v 0 0 0\n").is_err());
    }
}

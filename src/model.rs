//! "Load model by name": fetching, decoding and registering decorative
//! models before the frame loop starts.

use std::future::Future;
use std::path::Path;

use log::{info, warn};
use serde::Deserialize;

use crate::config::ModelConfig;
use crate::drawable::{DrawableKind, DrawableRegistry, GeometryUploader, MeshData};
use crate::error::ViewerError;
use crate::obj::parse_obj;

/// Byte source for model files: a directory natively, HTTP in the browser.
pub trait ModelSource {
    fn fetch(&self, name: &str) -> impl Future<Output = Result<Vec<u8>, ViewerError>>;
}

/// A model the scene wants, and the drawable slot it fills.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRequest {
    pub kind: DrawableKind,
    pub name: String,
}

/// Outcome of one load attempt.
#[derive(Debug)]
pub struct LoadedModel {
    pub kind: DrawableKind,
    pub name: String,
    pub mesh: Result<MeshData, ViewerError>,
}

#[derive(Debug, Deserialize)]
struct JsonModel {
    vertices: Vec<f32>,
    indices: Vec<u32>,
}

/// Tree first, then building, matching the scene's draw order.
pub fn model_requests(config: &ModelConfig) -> Vec<ModelRequest> {
    vec![
        ModelRequest {
            kind: DrawableKind::Tree,
            name: config.tree.clone(),
        },
        ModelRequest {
            kind: DrawableKind::ModelBuilding,
            name: config.building.clone(),
        },
    ]
}

/// Decodes model bytes. `.obj` files go through the OBJ parser, anything
/// else is read as `{ "vertices": [..], "indices": [..] }` JSON.
pub fn parse_model(name: &str, bytes: &[u8]) -> Result<MeshData, ViewerError> {
    let is_obj = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("obj"));

    let mesh = if is_obj {
        let text = std::str::from_utf8(bytes)
            .map_err(|err| ViewerError::invalid_model(name, format!("not valid UTF-8: {err}")))?;
        parse_obj(name, text)?
    } else {
        let model: JsonModel = serde_json::from_slice(bytes)
            .map_err(|err| ViewerError::invalid_model(name, err.to_string()))?;
        MeshData::indexed(model.vertices, model.indices)
    };
    validate_mesh(name, &mesh)?;
    Ok(mesh)
}

fn validate_mesh(name: &str, mesh: &MeshData) -> Result<(), ViewerError> {
    if mesh.positions.is_empty() || mesh.positions.len() % 3 != 0 {
        return Err(ViewerError::invalid_model(
            name,
            format!("{} vertex components is not a whole number of xyz triples", mesh.positions.len()),
        ));
    }
    if mesh.positions.iter().any(|value| !value.is_finite()) {
        return Err(ViewerError::invalid_model(name, "vertex data contains non-finite values"));
    }
    let indices = mesh.indices.as_deref().unwrap_or_default();
    if indices.is_empty() || indices.len() % 3 != 0 {
        return Err(ViewerError::invalid_model(
            name,
            format!("{} indices is not a whole number of triangles", indices.len()),
        ));
    }
    let vertex_count = mesh.vertex_count();
    if let Some(bad) = indices.iter().find(|&&index| index as usize >= vertex_count) {
        return Err(ViewerError::invalid_model(
            name,
            format!("index {bad} exceeds vertex count {vertex_count}"),
        ));
    }
    Ok(())
}

/// Attempts every request exactly once, in order. Failures are kept per
/// model so one missing file never hides the others.
pub async fn load_models<S>(source: &S, requests: &[ModelRequest]) -> Vec<LoadedModel>
where
    S: ModelSource,
{
    let mut loaded = Vec::with_capacity(requests.len());
    for request in requests {
        let mesh = match source.fetch(&request.name).await {
            Ok(bytes) => parse_model(&request.name, &bytes),
            Err(err) => Err(err),
        }
        .map_err(|err| match err {
            ViewerError::ModelLoad { .. } => err,
            other => ViewerError::ModelLoad {
                name: request.name.clone(),
                reason: other.to_string(),
            },
        });
        loaded.push(LoadedModel {
            kind: request.kind,
            name: request.name.clone(),
            mesh,
        });
    }
    loaded
}

/// Uploads the successfully decoded models. Returns how many were added.
pub fn register_models<U>(
    registry: &mut DrawableRegistry,
    uploader: &mut U,
    models: &[LoadedModel],
) -> usize
where
    U: GeometryUploader + ?Sized,
{
    let mut registered = 0;
    for model in models {
        match &model.mesh {
            Ok(mesh) => {
                registry.register(model.kind, mesh, uploader);
                info!(
                    "loaded model {} ({} triangles)",
                    model.name,
                    mesh.element_count() / 3
                );
                registered += 1;
            }
            Err(err) => warn!("{err}; {} instances will be skipped", model.kind.label()),
        }
    }
    registered
}

/// Reads models from a directory on disk.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: std::path::PathBuf,
}

#[cfg(not(target_arch = "wasm32"))]
impl DirectorySource {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl ModelSource for DirectorySource {
    async fn fetch(&self, name: &str) -> Result<Vec<u8>, ViewerError> {
        let path = self.root.join(name);
        std::fs::read(&path).map_err(|err| ViewerError::ModelLoad {
            name: name.to_string(),
            reason: format!("{}: {err}", path.display()),
        })
    }
}

/// Fetches models over HTTP relative to a base URL.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone)]
pub struct FetchSource {
    base_url: String,
}

#[cfg(target_arch = "wasm32")]
impl FetchSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    fn url(&self, name: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.is_empty() || base == "." {
            name.to_string()
        } else {
            format!("{base}/{name}")
        }
    }
}

#[cfg(target_arch = "wasm32")]
impl ModelSource for FetchSource {
    async fn fetch(&self, name: &str) -> Result<Vec<u8>, ViewerError> {
        use wasm_bindgen::JsCast;
        use wasm_bindgen_futures::JsFuture;

        let load_error = |reason: String| ViewerError::ModelLoad {
            name: name.to_string(),
            reason,
        };
        let window = web_sys::window()
            .ok_or_else(|| ViewerError::ContextUnavailable("window not available".into()))?;
        let response = JsFuture::from(window.fetch_with_str(&self.url(name)))
            .await
            .map_err(|err| load_error(format!("fetch failed: {err:?}")))?
            .dyn_into::<web_sys::Response>()
            .map_err(|_| load_error("fetch did not yield a Response".into()))?;
        if !response.ok() {
            return Err(load_error(format!(
                "HTTP {} {}",
                response.status(),
                response.status_text()
            )));
        }
        let promise = response
            .array_buffer()
            .map_err(|err| load_error(format!("unreadable body: {err:?}")))?;
        let buffer = JsFuture::from(promise)
            .await
            .map_err(|err| load_error(format!("unreadable body: {err:?}")))?;
        Ok(js_sys::Uint8Array::new(&buffer).to_vec())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::render::headless::HeadlessGeometry;

    const TRIANGLE_JSON: &str = r#"{ "vertices": [0, 0, 0, 1, 0, 0, 0, 1, 0], "indices": [0, 1, 2] }"#;

    struct MemorySource(HashMap<&'static str, &'static str>);

    impl ModelSource for MemorySource {
        async fn fetch(&self, name: &str) -> Result<Vec<u8>, ViewerError> {
            self.0
                .get(name)
                .map(|text| text.as_bytes().to_vec())
                .ok_or_else(|| ViewerError::ModelLoad {
                    name: name.to_string(),
                    reason: "not found".into(),
                })
        }
    }

    #[test]
    fn parses_json_models() {
        let mesh = parse_model("arbol.json", TRIANGLE_JSON.as_bytes()).unwrap();
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.indices, Some(vec![0, 1, 2]));
    }

    #[test]
    fn dispatches_obj_by_extension() {
        let mesh = parse_model("tree.OBJ", b"v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        assert_eq!(mesh.element_count(), 3);
    }

    #[test]
    fn rejects_malformed_models() {
        let cases: [&[u8]; 4] = [
            b"{ \"vertices\": [0, 0], \"indices\": [0, 1, 2] }",
            b"{ \"vertices\": [0, 0, 0, 1, 0, 0, 0, 1, 0], \"indices\": [0, 1] }",
            b"{ \"vertices\": [0, 0, 0, 1, 0, 0, 0, 1, 0], \"indices\": [0, 1, 3] }",
            b"not json",
        ];
        for bytes in cases {
            assert!(matches!(
                parse_model("edificio.json", bytes),
                Err(ViewerError::InvalidModel { .. })
            ));
        }
    }

    #[test]
    fn failures_are_isolated_per_model() {
        let source = MemorySource(HashMap::from([
            ("arbol.json", TRIANGLE_JSON),
            ("broken.json", "{"),
        ]));
        let requests = [
            ModelRequest {
                kind: DrawableKind::Tree,
                name: "arbol.json".into(),
            },
            ModelRequest {
                kind: DrawableKind::ModelBuilding,
                name: "broken.json".into(),
            },
        ];
        let loaded = pollster::block_on(load_models(&source, &requests));
        assert!(loaded[0].mesh.is_ok());
        assert!(matches!(
            loaded[1].mesh,
            Err(ViewerError::ModelLoad { ref name, .. }) if name == "broken.json"
        ));

        let mut registry = DrawableRegistry::new();
        let mut uploader = HeadlessGeometry::default();
        assert_eq!(register_models(&mut registry, &mut uploader, &loaded), 1);
        assert!(registry.contains(DrawableKind::Tree));
        assert!(!registry.contains(DrawableKind::ModelBuilding));
    }

    #[test]
    fn directory_source_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("arbol.json"), TRIANGLE_JSON).unwrap();
        let source = DirectorySource::new(dir.path());
        let loaded = pollster::block_on(load_models(
            &source,
            &model_requests(&ModelConfig::default()),
        ));
        assert_eq!(loaded[0].kind, DrawableKind::Tree);
        assert!(loaded[0].mesh.is_ok());
        let err = loaded[1].mesh.as_ref().unwrap_err();
        assert!(err.to_string().contains("edificio.json"));
    }
}

use crate::routes::{health, modules, pages};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(info(
    title = "modhub-server",
    description = "Module upload dashboard API",
    version = "0.1.0"
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(pages::PagesApi::openapi());
    root.merge(modules::ModulesApi::openapi());
    root
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn docs_cover_every_route() {
        let doc = get_docs();
        for path in ["/health", "/", "/add-module", "/module-mng", "/modules", "/delete-module/{module_id}"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}

//! Server-rendered pages. Templates are compiled into the binary.

use crate::errors::Result;
use tera::Tera;

/// Name of the listing page template.
pub const INDEX_TEMPLATE: &str = "index.html";

/// Builds the template set used by the handlers.
pub fn load_templates() -> Result<Tera> {
    let mut tera = Tera::default();
    tera.add_raw_template(INDEX_TEMPLATE, include_str!("../../templates/index.html"))?;
    Ok(tera)
}

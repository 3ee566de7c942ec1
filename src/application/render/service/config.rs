use ammonia::Builder as AmmoniaBuilder;
use comrak::options::Options;

use crate::application::render::types::{DIAGRAM_PROCESSED_ATTR, DIAGRAM_SOURCE_ATTR, LINE_ATTR};

pub(crate) fn default_options() -> Options<'static> {
    let mut options = Options::default();
    configure_extensions(&mut options);
    options
}

/// Default safe-HTML profile plus the attributes the preview relies on:
/// line anchors, diagram placeholders, highlighter classes and task-list
/// checkboxes.
pub(crate) fn build_sanitizer() -> AmmoniaBuilder<'static> {
    let mut builder = AmmoniaBuilder::default();
    builder
        .add_tags(&["input"])
        .add_tag_attributes("input", &["type", "checked", "disabled"]);
    builder.add_generic_attributes(&[
        "class",
        "id",
        DIAGRAM_SOURCE_ATTR,
        DIAGRAM_PROCESSED_ATTR,
        LINE_ATTR,
    ]);
    builder.add_generic_attribute_prefixes(&["data-"]);
    builder
}

fn configure_extensions(options: &mut Options<'static>) {
    let ext = &mut options.extension;
    ext.strikethrough = true;
    ext.tagfilter = false;
    ext.table = true;
    ext.autolink = true;
    ext.tasklist = true;
    ext.footnotes = false;

    let render = &mut options.render;
    render.hardbreaks = true;
    render.github_pre_lang = false;
    render.r#unsafe = true;
    render.sourcepos = false;
    render.gfm_quirks = true;
}

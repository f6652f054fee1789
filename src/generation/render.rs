//! Prompt rendering.
//!
//! Configurations come in two shapes. Clean configurations keep pure
//! instructions in `system_prompt` and a `{{placeholder}}` template in
//! `user_prompt`. Legacy configurations, not yet migrated, embed a
//! `CONTEXTO DO POST:` block with placeholders inside `system_prompt`
//! itself; for those the block is cut out and a user prompt is synthesized
//! from the context in a fixed field order. The legacy output must stay
//! byte-stable: regression baselines depend on it.

use std::borrow::Cow;

use super::types::{GenerationConfig, GenerationContext};

/// Longest `content` value, in characters, that reaches a prompt.
pub const CONTENT_LIMIT: usize = 2000;

pub const LEGACY_CONTEXT_MARKER: &str = "CONTEXTO DO POST:";
pub const LEGACY_DEFAULT_USER_PROMPT: &str = "Gere o conteudo.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Clean,
    Legacy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub system_prompt: String,
    pub user_prompt: String,
    pub mode: RenderMode,
}

pub fn mode_for(config: &GenerationConfig) -> RenderMode {
    let has_template = config
        .user_prompt
        .as_deref()
        .is_some_and(|t| !t.trim().is_empty());

    if has_placeholder(&config.system_prompt) || !has_template {
        RenderMode::Legacy
    } else {
        RenderMode::Clean
    }
}

pub fn render(config: &GenerationConfig, context: &GenerationContext) -> RenderedPrompt {
    let mode = mode_for(config);

    match mode {
        RenderMode::Clean => RenderedPrompt {
            system_prompt: config.system_prompt.clone(),
            user_prompt: substitute(config.user_prompt.as_deref().unwrap_or_default(), context),
            mode,
        },
        RenderMode::Legacy => {
            let stripped = strip_context_block(&config.system_prompt);
            RenderedPrompt {
                system_prompt: substitute(&stripped, context),
                user_prompt: legacy_user_prompt(context),
                mode,
            }
        }
    }
}

/// First `limit` characters of `s`.
pub fn truncate_chars(s: &str, limit: usize) -> &str {
    match s.char_indices().nth(limit) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

pub fn has_placeholder(text: &str) -> bool {
    let mut found = false;
    scan(text, |segment| {
        if let Segment::Placeholder(_) = segment {
            found = true;
        }
    });
    found
}

/// Replaces every `{{name}}` with the matching context value. Names with no
/// value render as the empty string.
pub fn substitute(template: &str, context: &GenerationContext) -> String {
    let mut out = String::with_capacity(template.len());
    scan(template, |segment| match segment {
        Segment::Text(text) => out.push_str(text),
        Segment::Placeholder(name) => {
            if let Some(value) = placeholder_value(name, context) {
                out.push_str(&value);
            }
        }
    });
    out
}

enum Segment<'a> {
    Text(&'a str),
    Placeholder(&'a str),
}

fn scan<'a>(template: &'a str, mut emit: impl FnMut(Segment<'a>)) {
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        let inner_start = open + 2;
        let Some(close) = rest[inner_start..].find("}}") else {
            break;
        };
        let inner_end = inner_start + close;
        let name = rest[inner_start..inner_end].trim();

        if is_placeholder_name(name) {
            emit(Segment::Text(&rest[..open]));
            emit(Segment::Placeholder(name));
        } else {
            emit(Segment::Text(&rest[..inner_end + 2]));
        }
        rest = &rest[inner_end + 2..];
    }

    emit(Segment::Text(rest));
}

fn is_placeholder_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn placeholder_value<'a>(name: &str, ctx: &'a GenerationContext) -> Option<Cow<'a, str>> {
    let value = match name {
        "title" => non_empty(&ctx.title).map(Cow::Borrowed),
        "subtitle" => non_empty(&ctx.subtitle).map(Cow::Borrowed),
        "content" => non_empty(&ctx.content).map(|c| Cow::Borrowed(truncate_chars(c, CONTENT_LIMIT))),
        "keywords" => (!ctx.keywords.is_empty()).then(|| Cow::Owned(ctx.keywords.join(", "))),
        "category" => non_empty(&ctx.category).map(Cow::Borrowed),
        "product_name" => non_empty(&ctx.product_name).map(Cow::Borrowed),
        "target_audience" => non_empty(&ctx.target_audience).map(Cow::Borrowed),
        "price" => ctx.price.map(|p| Cow::Owned(format!("{p:.2}"))),
        "platform" => non_empty(&ctx.platform).map(Cow::Borrowed),
        "headline" => non_empty(&ctx.headline).map(Cow::Borrowed),
        "badge" => non_empty(&ctx.badge).map(Cow::Borrowed),
        _ => None,
    };

    value.or_else(|| ctx.extra.get(name).map(|v| Cow::Borrowed(v.as_str())))
}

/// Removes the `CONTEXTO DO POST:` block, from the marker up to the next
/// section heading or the end of the prompt.
fn strip_context_block(system: &str) -> String {
    let Some(start) = system.find(LEGACY_CONTEXT_MARKER) else {
        return system.to_string();
    };

    let body_start = start + LEGACY_CONTEXT_MARKER.len();
    let mut offset = 0;
    let mut end = None;

    for line in system[body_start..].split_inclusive('\n') {
        // first item is the rest of the marker line itself
        if offset > 0 && is_section_heading(line) {
            end = Some(body_start + offset);
            break;
        }
        offset += line.len();
    }

    match end {
        Some(end) => format!("{}{}", &system[..start], &system[end..]),
        None => system[..start].trim_end().to_string(),
    }
}

/// A heading opens with an all-caps word such as `REGRAS:` or `TAREFA:`.
fn is_section_heading(line: &str) -> bool {
    let Some(word) = line.split_whitespace().next() else {
        return false;
    };
    let word = word.trim_end_matches(':');

    word.chars().count() >= 2 && word.chars().all(|c| c.is_alphabetic() && c.is_uppercase())
}

fn legacy_user_prompt(ctx: &GenerationContext) -> String {
    let mut parts = Vec::new();

    if let Some(title) = non_empty(&ctx.title) {
        parts.push(format!("Titulo: {title}"));
    }
    if let Some(subtitle) = non_empty(&ctx.subtitle) {
        parts.push(format!("Subtitulo: {subtitle}"));
    }
    if let Some(content) = non_empty(&ctx.content) {
        parts.push(format!("Conteudo:\n{}", truncate_chars(content, CONTENT_LIMIT)));
    }
    if let Some(category) = non_empty(&ctx.category) {
        parts.push(format!("Categoria: {category}"));
    }
    if !ctx.keywords.is_empty() {
        parts.push(format!("Palavras-chave: {}", ctx.keywords.join(", ")));
    }
    if let Some(product_name) = non_empty(&ctx.product_name) {
        parts.push(format!("Produto: {product_name}"));
    }

    if parts.is_empty() {
        LEGACY_DEFAULT_USER_PROMPT.to_string()
    } else {
        parts.join("\n\n")
    }
}

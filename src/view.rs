//! Terminal rendering of the weather card.
//!
//! Pure functions from [`AppState`] to text: no I/O, no mutation, so every
//! state the UI can reach is assertable in tests.

use crate::state::AppState;

const PLACEHOLDER: &str = "--";

/// Renders the whole card view for the current state.
pub fn render(state: &AppState) -> String {
    let mut out = String::new();
    out.push_str(&render_header(state));
    out.push('\n');

    if state.error().is_some() {
        out.push_str(&render_error_panel(state));
    } else if state.loading() {
        out.push_str(&render_skeleton());
    } else if state.snapshot().is_some() {
        out.push_str(&render_card(state));
    }

    out.push('\n');
    out.push_str(&render_footer(state));
    out
}

fn render_header(state: &AppState) -> String {
    let subtitle = if state.loading() {
        "Finding your perspective...".to_string()
    } else if let Some(snapshot) = state.snapshot() {
        let city = snapshot.city.as_deref().unwrap_or(PLACEHOLDER);
        format!("{city} · Cinematic Mode")
    } else {
        String::new()
    };
    format!("SKYSYNC\n{subtitle}\n")
}

fn render_error_panel(state: &AppState) -> String {
    let message = state.error().unwrap_or_default();
    format!("  !  {message}\n     [ Retry Location Sync ]\n")
}

fn render_skeleton() -> String {
    let mut out = String::new();
    for width in [24, 16, 20] {
        out.push_str("  ");
        out.push_str(&"░".repeat(width));
        out.push('\n');
    }
    out
}

fn render_card(state: &AppState) -> String {
    let Some(snapshot) = state.snapshot() else {
        return String::new();
    };

    let mut out = String::new();
    out.push_str(&format!(
        "  {}\n",
        snapshot.city.as_deref().unwrap_or(PLACEHOLDER)
    ));
    out.push_str(&format!(
        "  {}  {}\n",
        snapshot.temperature.as_deref().unwrap_or(PLACEHOLDER),
        snapshot.condition.as_deref().unwrap_or(PLACEHOLDER),
    ));
    out.push_str(&format!(
        "  Landmark: {}\n",
        snapshot.landmark_name.as_deref().unwrap_or(PLACEHOLDER)
    ));
    if let Some(description) = &snapshot.landmark_description {
        out.push_str(&format!("    {description}\n"));
    }

    if !snapshot.sources.is_empty() {
        out.push_str("  Sources:\n");
        for citation in &snapshot.sources {
            out.push_str(&format!(
                "    [{}] {} <{}>\n",
                citation.kind, citation.title, citation.uri
            ));
        }
    }

    let backdrop = state.backdrop();
    if backdrop.video_visible {
        out.push_str("  Backdrop: cinematic video");
        if backdrop.image_mounted {
            out.push_str(" (still image mounted beneath)");
        }
        out.push('\n');
    } else if backdrop.image_visible {
        out.push_str("  Backdrop: still image\n");
    }

    out
}

fn render_footer(state: &AppState) -> String {
    let mut out = String::from("Maps Grounding · Nano Banana · Veo Cinematic\n");
    if state.editing() {
        out.push_str("Editing Background Image...\n");
    } else if state.backdrop().video_visible {
        out.push_str("Live Cinematic Background Active\n");
    }
    out
}

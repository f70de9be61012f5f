//! Codex personality-template placeholder substitution (spec §4.4).

/// Variables substituted into a `codex_model_instructions_system` template.
pub struct TemplateContext<'a> {
    pub personality: &'a str,
    pub turn_mode: &'a str,
    pub known_mode_names: &'a [&'a str],
    pub request_user_input_available: bool,
}

/// Render `template`, substituting all four known placeholders. Returns
/// `None` if any `{{ ... }}` marker survives the substitution pass —
/// callers must fall back to `base_instructions` on `None`.
pub fn render(template: &str, ctx: &TemplateContext) -> Option<String> {
    let rendered = template
        .replace("{{ personality }}", ctx.personality)
        .replace("{{ TURN_MODE }}", ctx.turn_mode)
        .replace("{{ KNOWN_MODE_NAMES }}", &ctx.known_mode_names.join(", "))
        .replace(
            "{{ REQUEST_USER_INPUT_AVAILABLE }}",
            if ctx.request_user_input_available { "true" } else { "false" },
        );

    if rendered.contains("{{") {
        None
    } else {
        Some(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_all_known_placeholders() {
        let ctx = TemplateContext {
            personality: "pragmatic",
            turn_mode: "execute",
            known_mode_names: &["plan", "execute"],
            request_user_input_available: true,
        };
        let out = render(
            "{{ personality }} / {{ TURN_MODE }} / {{ KNOWN_MODE_NAMES }} / {{ REQUEST_USER_INPUT_AVAILABLE }}",
            &ctx,
        )
        .unwrap();
        assert_eq!(out, "pragmatic / execute / plan, execute / true");
    }

    #[test]
    fn unresolved_placeholder_returns_none() {
        let ctx = TemplateContext {
            personality: "pragmatic",
            turn_mode: "execute",
            known_mode_names: &[],
            request_user_input_available: false,
        };
        assert!(render("{{ unknown_var }}", &ctx).is_none());
    }
}

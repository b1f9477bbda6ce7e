use std::collections::BTreeMap;

use handlebars::Handlebars;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::cli::error::LwError;

/// `{{.name}}` references; the leading dot is optional.
static VARIABLE_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*\.?([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").unwrap());

/// Splits `name=value` pairs. The value may itself contain `=`.
pub(crate) fn parse_vars(raw: &[String]) -> Result<BTreeMap<String, String>, LwError> {
    raw.iter()
        .map(|var| match var.split_once('=') {
            Some((name, value)) if !name.trim().is_empty() => {
                Ok((name.trim().to_string(), value.to_string()))
            }
            _ => Err(LwError::input(
                var.clone(),
                "var",
                "expected name=value",
            )),
        })
        .collect()
}

/// Substitutes every variable reference in `text`. A reference to a variable
/// missing from `vars` is an error.
pub(crate) fn render(text: &str, vars: &BTreeMap<String, String>) -> Result<String, LwError> {
    let normalized = VARIABLE_REFERENCE.replace_all(text, "{{${1}}}");

    let mut handlebars = Handlebars::new();
    handlebars.set_strict_mode(true);
    handlebars.register_escape_fn(handlebars::no_escape);

    Ok(handlebars.render_template(&normalized, vars)?)
}

#[cfg(test)]
mod test {
    use super::{parse_vars, render};

    fn vars(raw: &[&str]) -> std::collections::BTreeMap<String, String> {
        parse_vars(&raw.iter().map(|s| s.to_string()).collect::<Vec<_>>()).unwrap()
    }

    #[test]
    fn substitutes_dotted_and_bare_references() {
        let rendered = render(
            "hostname: web1.{{.env}}.example.com\nzone: {{ zone }}\n",
            &vars(&["env=stg", "zone=27"]),
        )
        .unwrap();

        assert_eq!(rendered, "hostname: web1.stg.example.com\nzone: 27\n");
    }

    #[test]
    fn values_are_not_html_escaped() {
        let rendered = render("key: {{.key}}", &vars(&["key=ssh-rsa AAAA<&>=="])).unwrap();
        assert_eq!(rendered, "key: ssh-rsa AAAA<&>==");
    }

    #[test]
    fn unresolved_reference_is_an_error() {
        let err = render("hostname: {{.missing}}", &vars(&["env=stg"])).unwrap_err();
        assert_eq!(err.class(), "Input");
    }

    #[test]
    fn rendering_twice_changes_nothing() {
        let vars = vars(&["env=prod"]);
        let once = render("a: {{.env}}\nb: plain text\n", &vars).unwrap();
        let twice = render(&once, &vars).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn malformed_vars_are_rejected() {
        for raw in ["novalue", "=value", ""] {
            assert!(parse_vars(&[raw.to_string()]).is_err(), "{raw:?}");
        }
        assert_eq!(vars(&["url=https://x?a=b"])["url"], "https://x?a=b");
    }
}

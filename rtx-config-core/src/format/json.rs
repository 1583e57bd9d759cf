use crate::stream::CommandStream;

/// Format a command stream, scope arena included, as JSON.
pub fn format_json(stream: &CommandStream) -> String {
    serde_json::to_string_pretty(stream).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::format_json;
    use crate::parse;

    #[test]
    fn json_carries_scope_tags() {
        let stream = parse("tunnel select 1\n tunnel encapsulation l2tpv3");
        let value: serde_json::Value =
            serde_json::from_str(&format_json(&stream)).expect("valid json");

        assert_eq!(value["line_count"], 2);
        assert_eq!(value["scopes"][1]["key"]["kind"], "tunnel");
        assert_eq!(value["scopes"][1]["key"]["id"], 1);
        assert_eq!(value["commands"][1]["text"], "tunnel encapsulation l2tpv3");
        assert_eq!(value["commands"][1]["scope"], 1);
    }
}

use rmcp::model::Tool;

pub(crate) fn all_tools() -> Vec<Tool> {
    use crate::tool_schemas as schemas;
    vec![
        schemas::tool_hover_at_position(),
        schemas::tool_hover_at_symbol(),
        schemas::tool_public_type_shape(),
        schemas::tool_get_current_config(),
        schemas::tool_clear_hover_cache(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_tool_has_an_object_schema() {
        let tools = all_tools();
        let names: Vec<String> = tools.iter().map(|t| t.name.to_string()).collect();
        assert_eq!(
            names,
            [
                "hover_at_position",
                "hover_at_symbol",
                "public_type_shape",
                "get_current_config",
                "clear_hover_cache"
            ]
        );
        for tool in &tools {
            assert_eq!(
                tool.input_schema.get("type").and_then(|v| v.as_str()),
                Some("object")
            );
        }
    }
}

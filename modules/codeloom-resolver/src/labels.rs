//! Analyzer node-type → final Neo4j label mapping.

/// Map an analyzer-reported primary type to its canonical label. Types
/// already in canonical form map to themselves; unknown types fall through
/// to `Unknown` and keep an `Original_<type>` marker label.
pub fn map_node_type(node_type: &str) -> &str {
    match node_type {
        // Core types
        "File" => "File",
        "Module" => "Module",
        "FunctionDefinition" | "Function" => "Function",
        "ClassDefinition" | "Class" => "Class",
        "MethodDefinition" | "Method" => "Method",
        "VariableDeclaration" | "Variable" => "Variable",
        "Attribute" => "Attribute",
        "Import" => "Import",
        "Parameter" => "Parameter",
        "InterfaceDefinition" | "Interface" => "Interface",
        "EnumDefinition" | "Enum" => "Enum",
        "StructDefinition" | "Struct" => "Struct",
        "TypeAlias" => "TypeAlias",
        // Hint types
        "ApiEndpointHint" | "ApiEndpoint" => "ApiEndpoint",
        "DatabaseTableHint" | "Table" => "Table",
        "DatabaseColumnHint" | "Column" => "Column",
        "ExternalUrlHint" | "ExternalUrl" => "ExternalUrl",
        "EnvironmentVariableHint" | "EnvironmentVariable" => "EnvironmentVariable",
        "ApiCallHint" | "ApiCall" => "ApiCall",
        "DatabaseQueryHint" | "DatabaseQuery" => "DatabaseQuery",
        "HtmlElement" => "HtmlElement",
        "External" => "External",
        // Generic / fallback
        "CodeIdentifier" => "CodeIdentifier",
        _ => "Unknown",
    }
}

/// Compute the final label set: primary first, then the capitalized
/// language, then an `Original_<type>` marker when the mapping failed.
pub fn final_labels(node_type: &str, language: &str) -> Vec<String> {
    let mapped = map_node_type(node_type);
    let mut labels = vec![mapped.to_string()];
    if !language.is_empty() && mapped != "External" {
        let lang = capitalize(language);
        if lang != mapped {
            labels.push(lang);
        }
    }
    if mapped == "Unknown" && node_type != "Unknown" {
        labels.push(format!("Original_{node_type}"));
    }
    labels
}

pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

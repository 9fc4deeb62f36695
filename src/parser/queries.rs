//! Per-language tree-sitter query patterns
//!
//! Each pattern is compiled individually; a pattern that fails to compile
//! against the active grammar version is skipped so grammar drift degrades
//! coverage instead of breaking extraction.
//!
//! Capture conventions:
//! - `@def.<kind>` marks the declaration node and its symbol kind
//! - `@name` marks the name token
//! - `@body` (optional) marks the body; the signature spans up to it
//! - `@context` (optional) marks the enclosing receiver/container used to
//!   build alternative name forms

use super::Language;

/// Symbol-definition patterns for a language.
pub fn symbol_patterns(language: Language) -> &'static [&'static str] {
    match language {
        Language::Golang => &[
            "(function_declaration name: (identifier) @name body: (block)? @body) @def.function",
            "(method_declaration receiver: (parameter_list) @context name: (field_identifier) @name body: (block)? @body) @def.method",
            "(type_declaration (type_spec name: (type_identifier) @name type: (interface_type) @body)) @def.interface",
            "(type_declaration (type_spec name: (type_identifier) @name type: (struct_type) @body)) @def.type",
            "(type_declaration (type_spec name: (type_identifier) @name)) @def.type",
            "(type_declaration (type_alias name: (type_identifier) @name)) @def.alias",
            "(const_declaration (const_spec name: (identifier) @name)) @def.const",
            "(var_declaration (var_spec name: (identifier) @name)) @def.var",
        ],
        Language::Python => &[
            "(function_definition name: (identifier) @name body: (block)? @body) @def.function",
            "(class_definition name: (identifier) @name body: (block)? @body) @def.class",
            "(class_definition name: (identifier) @context body: (block (function_definition name: (identifier) @name body: (block)? @body) @def.method))",
            "(module (expression_statement (assignment left: (identifier) @name)) @def.var)",
        ],
        Language::Typescript | Language::Tsx => &[
            "(function_declaration name: (identifier) @name body: (_)? @body) @def.function",
            "(generator_function_declaration name: (identifier) @name body: (_)? @body) @def.function",
            "(class_declaration name: (type_identifier) @name body: (_)? @body) @def.class",
            "(abstract_class_declaration name: (type_identifier) @name body: (_)? @body) @def.class",
            "(class_declaration name: (type_identifier) @context body: (class_body (method_definition name: (property_identifier) @name body: (_)? @body) @def.method))",
            "(interface_declaration name: (type_identifier) @name body: (_)? @body) @def.interface",
            "(type_alias_declaration name: (type_identifier) @name) @def.alias",
            "(enum_declaration name: (identifier) @name body: (_)? @body) @def.enum",
            "(program (lexical_declaration (variable_declarator name: (identifier) @name)) @def.var)",
            "(program (variable_declaration (variable_declarator name: (identifier) @name)) @def.var)",
            "(program (export_statement (lexical_declaration (variable_declarator name: (identifier) @name)) @def.var))",
        ],
        Language::Javascript => &[
            "(function_declaration name: (identifier) @name body: (_)? @body) @def.function",
            "(generator_function_declaration name: (identifier) @name body: (_)? @body) @def.function",
            "(class_declaration name: (identifier) @name body: (_)? @body) @def.class",
            "(class_declaration name: (identifier) @context body: (class_body (method_definition name: (property_identifier) @name body: (_)? @body) @def.method))",
            "(program (lexical_declaration (variable_declarator name: (identifier) @name)) @def.var)",
            "(program (variable_declaration (variable_declarator name: (identifier) @name)) @def.var)",
            "(program (export_statement (lexical_declaration (variable_declarator name: (identifier) @name)) @def.var))",
        ],
        Language::Java => &[
            "(class_declaration name: (identifier) @name body: (_)? @body) @def.class",
            "(interface_declaration name: (identifier) @name body: (_)? @body) @def.interface",
            "(enum_declaration name: (identifier) @name body: (_)? @body) @def.enum",
            "(record_declaration name: (identifier) @name body: (_)? @body) @def.class",
            "(method_declaration name: (identifier) @name body: (_)? @body) @def.method",
            "(constructor_declaration name: (identifier) @name body: (_)? @body) @def.method",
            "(class_declaration name: (identifier) @context body: (class_body (method_declaration name: (identifier) @name body: (_)? @body) @def.method))",
            "(field_declaration declarator: (variable_declarator name: (identifier) @name)) @def.field",
        ],
        Language::Kotlin => &[
            "(class_declaration (type_identifier) @name) @def.class",
            "(object_declaration (type_identifier) @name) @def.class",
            "(function_declaration (simple_identifier) @name (function_body)? @body) @def.function",
            "(property_declaration (variable_declaration (simple_identifier) @name)) @def.var",
        ],
        Language::Rust => &[
            "(function_item name: (identifier) @name body: (_)? @body) @def.function",
            "(struct_item name: (type_identifier) @name) @def.type",
            "(union_item name: (type_identifier) @name) @def.type",
            "(enum_item name: (type_identifier) @name body: (_)? @body) @def.enum",
            "(trait_item name: (type_identifier) @name body: (_)? @body) @def.interface",
            "(type_item name: (type_identifier) @name) @def.alias",
            "(const_item name: (identifier) @name) @def.const",
            "(static_item name: (identifier) @name) @def.var",
            "(mod_item name: (identifier) @name body: (_)? @body) @def.module",
            "(impl_item type: (type_identifier) @context body: (declaration_list (function_item name: (identifier) @name body: (_)? @body) @def.method))",
        ],
        Language::C => &[
            "(function_definition declarator: (function_declarator declarator: (identifier) @name) body: (_)? @body) @def.function",
            "(function_definition declarator: (pointer_declarator declarator: (function_declarator declarator: (identifier) @name)) body: (_)? @body) @def.function",
            "(struct_specifier name: (type_identifier) @name body: (field_declaration_list) @body) @def.type",
            "(union_specifier name: (type_identifier) @name body: (field_declaration_list) @body) @def.type",
            "(enum_specifier name: (type_identifier) @name body: (enumerator_list) @body) @def.enum",
            "(type_definition declarator: (type_identifier) @name) @def.alias",
            "(translation_unit (declaration declarator: (init_declarator declarator: (identifier) @name)) @def.var)",
        ],
        Language::Cpp => &[
            "(function_definition declarator: (function_declarator declarator: (identifier) @name) body: (_)? @body) @def.function",
            "(function_definition declarator: (pointer_declarator declarator: (function_declarator declarator: (identifier) @name)) body: (_)? @body) @def.function",
            "(function_definition declarator: (function_declarator declarator: (qualified_identifier) @name) body: (_)? @body) @def.method",
            "(function_definition declarator: (function_declarator declarator: (field_identifier) @name) body: (_)? @body) @def.method",
            "(class_specifier name: (type_identifier) @name body: (field_declaration_list) @body) @def.class",
            "(struct_specifier name: (type_identifier) @name body: (field_declaration_list) @body) @def.type",
            "(enum_specifier name: (type_identifier) @name body: (enumerator_list) @body) @def.enum",
            "(type_definition declarator: (type_identifier) @name) @def.alias",
            "(namespace_definition name: (namespace_identifier) @name body: (declaration_list) @body) @def.module",
            "(translation_unit (declaration declarator: (init_declarator declarator: (identifier) @name)) @def.var)",
        ],
        _ => &[],
    }
}

/// File-prologue patterns: package declarations, imports, includes.
pub fn header_patterns(language: Language) -> &'static [&'static str] {
    match language {
        Language::Golang => &["(package_clause) @header", "(import_declaration) @header"],
        Language::Python => &[
            "(import_statement) @header",
            "(import_from_statement) @header",
            "(future_import_statement) @header",
        ],
        Language::Typescript | Language::Tsx | Language::Javascript => {
            &["(import_statement) @header"]
        }
        Language::Java => &[
            "(package_declaration) @header",
            "(import_declaration) @header",
        ],
        Language::Kotlin => &["(package_header) @header", "(import_list) @header"],
        Language::Rust => &[
            "(use_declaration) @header",
            "(extern_crate_declaration) @header",
        ],
        Language::C | Language::Cpp => &["(preproc_include) @header"],
        _ => &[],
    }
}

use proc_macro::TokenStream;
use quote::quote;
use std::collections::{HashMap, HashSet};
use syn::{
    Attribute, Data, DeriveInput, Expr, Fields, Ident, Meta, Token, Type, parse_macro_input,
};

/// Helper enum for parsed attribute values
enum MetaValue {
    Str(String),
    Expr(Expr),
    Flag,
}

const KIND_FLAGS: [(&str, &str); 5] = [
    ("string", "String"),
    ("number", "Number"),
    ("boolean", "Boolean"),
    ("object", "Object"),
    ("secret", "Secret"),
];

const STR_KEYS: [&str; 3] = ["name", "separator", "doc"];

const KNOWN_KEYS: [&str; 16] = [
    "string", "number", "boolean", "object", "secret", "optional", "required", "unset", "extends",
    "skip", "name", "separator", "doc", "validator", "default", "no_default",
];

/// Derive `envprop::EnvConfig` and `Default` for a struct with named fields
///
/// Field attribute: `#[env(kind?, optional|required, unset, name = "VAR",
/// separator = ",", validator = expr, default = expr, doc = "...")]`,
/// `#[env(extends)]` to compose another configuration, `#[env(skip)]` to
/// leave a field alone. Struct attribute `#[env(no_default)]` suppresses
/// the generated `Default` impl.
#[proc_macro_derive(EnvConfig, attributes(env))]
pub fn derive_env_config(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match generate_config(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn generate_config(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let struct_opts = match find_env_attr(&input.attrs) {
        Some(attr) => parse_env_list(attr)?,
        None => HashMap::new(),
    };
    for key in struct_opts.keys() {
        if key != "no_default" {
            return Err(syn::Error::new_spanned(
                input,
                format!("unsupported struct-level option `{}`, expected no_default", key),
            ));
        }
    }
    let generate_default = !struct_opts.contains_key("no_default");

    // Extract fields from the struct
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "EnvConfig can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "EnvConfig can only be derived for structs",
            ));
        }
    };

    let mut declarations = Vec::new();
    let mut redeclarations = Vec::new();
    let mut ancestors = Vec::new();
    let mut current_arms = Vec::new();
    let mut assign_arms = Vec::new();
    let mut defaults = Vec::new();
    let mut seen = HashSet::new();

    for field in fields {
        let Some(field_name) = field.ident.as_ref() else {
            continue;
        };
        let config = parse_field_config(field)?;

        let default_expr = match &config.default {
            Some(expr) => quote! { #expr },
            None => quote! { ::core::default::Default::default() },
        };
        defaults.push(quote! { #field_name: #default_expr });

        match config.role {
            FieldRole::Skip => continue,
            FieldRole::Extends => {
                ancestors.push((field_name, &field.ty));
                continue;
            }
            FieldRole::Managed => {}
        }

        let key = registry_key(field_name);
        if !seen.insert(key.clone()) {
            return Err(syn::Error::new_spanned(
                field,
                format!("field `{}` is declared more than once", key),
            ));
        }

        let options = field_options(&config, &field.ty);
        declarations.push(quote! {
            registry.declare(#key, #options);
        });
        redeclarations.push(quote! {
            registrar.register(#key, #options);
        });

        // Only Option fields and fields with an explicit default can hold a default
        let (is_option, _) = extract_option_type(&field.ty);
        let current = if is_option || config.default.is_some() {
            quote! { ::envprop::field::encode(&self.#field_name) }
        } else {
            quote! { ::core::option::Option::None }
        };
        current_arms.push(quote! { #key => #current, });

        assign_arms.push(quote! {
            #key => {
                self.#field_name = ::envprop::field::decode(name, value)?;
                ::core::result::Result::Ok(())
            }
        });
    }

    let merge_ancestors = ancestors.iter().map(|(_, ty)| {
        quote! {
            registry.merge_ancestor(&<#ty as ::envprop::EnvConfig>::fields());
        }
    });

    let configure_body = if ancestors.is_empty() {
        quote! { registrar.configure_base(); }
    } else {
        let calls = ancestors.iter().map(|(ident, _)| {
            quote! { ::envprop::EnvConfig::configure(&self.#ident, registrar); }
        });
        // Own declarations go last so ancestor hooks cannot shadow them
        quote! {
            #(#calls)*
            #(#redeclarations)*
        }
    };

    let current_fallback = ancestors.iter().map(|(ident, _)| {
        quote! {
            if let ::core::option::Option::Some(value) = ::envprop::EnvConfig::current(&self.#ident, name) {
                return ::core::option::Option::Some(value);
            }
        }
    });

    let assign_fallback = ancestors.iter().map(|(ident, _)| {
        quote! {
            match ::envprop::EnvConfig::assign(&mut self.#ident, name, value.clone()) {
                ::core::result::Result::Err(::envprop::ConfigError::UnknownField(_)) => {}
                other => return other,
            }
        }
    });

    let config_impl = quote! {
        impl #impl_generics ::envprop::EnvConfig for #struct_name #ty_generics #where_clause {
            fn fields() -> ::envprop::FieldRegistry {
                let mut registry = ::envprop::FieldRegistry::new();
                #(#declarations)*
                #(#merge_ancestors)*
                registry
            }

            fn configure(&self, registrar: &mut ::envprop::Registrar) {
                #configure_body
            }

            fn current(&self, name: &str) -> ::core::option::Option<::envprop::Value> {
                match name {
                    #(#current_arms)*
                    _ => {
                        #(#current_fallback)*
                        ::core::option::Option::None
                    }
                }
            }

            #[allow(unused_variables)]
            fn assign(
                &mut self,
                name: &str,
                value: ::envprop::Value,
            ) -> ::core::result::Result<(), ::envprop::ConfigError> {
                match name {
                    #(#assign_arms)*
                    _ => {
                        #(#assign_fallback)*
                        ::core::result::Result::Err(::envprop::ConfigError::UnknownField(name.to_string()))
                    }
                }
            }
        }
    };

    let default_impl = if generate_default {
        quote! {
            impl #impl_generics ::core::default::Default for #struct_name #ty_generics #where_clause {
                fn default() -> Self {
                    Self {
                        #(#defaults),*
                    }
                }
            }
        }
    } else {
        quote! {}
    };

    Ok(quote! {
        #config_impl
        #default_impl
    })
}

#[derive(Debug, PartialEq)]
enum FieldRole {
    Managed,
    Extends,
    Skip,
}

#[derive(Debug)]
struct FieldConfig {
    role: FieldRole,
    kind: Option<&'static str>,
    optional: bool,
    unset: bool,
    env_name: Option<String>,
    separator: Option<String>,
    description: Option<String>,
    validator: Option<Expr>,
    default: Option<Expr>,
}

fn find_env_attr(attrs: &[Attribute]) -> Option<&Attribute> {
    attrs.iter().find(|attr| attr.path().is_ident("env"))
}

/// Parse #[env(name = "X", separator = ",", default = val, optional)] syntax
fn parse_env_list(attr: &Attribute) -> syn::Result<HashMap<String, MetaValue>> {
    let meta_list = match &attr.meta {
        Meta::List(list) => list,
        _ => {
            return Err(syn::Error::new_spanned(
                attr,
                "env attribute must be a list: #[env(...)]",
            ));
        }
    };

    let mut values = HashMap::new();

    meta_list.parse_nested_meta(|meta| {
        let key = meta
            .path
            .get_ident()
            .ok_or_else(|| meta.error("expected identifier"))?
            .to_string();

        if !KNOWN_KEYS.contains(&key.as_str()) {
            return Err(meta.error(format!("unknown env option `{}`", key)));
        }

        if meta.input.peek(Token![=]) {
            meta.input.parse::<Token![=]>()?;

            if STR_KEYS.contains(&key.as_str()) {
                let value: syn::LitStr = meta.input.parse()?;
                values.insert(key, MetaValue::Str(value.value()));
            } else {
                let expr: Expr = meta.input.parse()?;
                values.insert(key, MetaValue::Expr(expr));
            }
        } else {
            values.insert(key, MetaValue::Flag);
        }

        Ok(())
    })?;

    Ok(values)
}

fn parse_field_config(field: &syn::Field) -> syn::Result<FieldConfig> {
    let parsed = match find_env_attr(&field.attrs) {
        Some(attr) => parse_env_list(attr)?,
        None => HashMap::new(),
    };

    let flag = |key: &str| matches!(parsed.get(key), Some(MetaValue::Flag));
    let string = |key: &str| match parsed.get(key) {
        Some(MetaValue::Str(s)) => Some(s.trim().to_string()),
        _ => None,
    };
    let expr = |key: &str| match parsed.get(key) {
        Some(MetaValue::Expr(e)) => Some(e.clone()),
        _ => None,
    };

    for key in ["validator", "default"] {
        if matches!(parsed.get(key), Some(MetaValue::Flag | MetaValue::Str(_))) {
            return Err(syn::Error::new_spanned(
                field,
                format!("{} expects an expression: {} = ...", key, key),
            ));
        }
    }
    for key in STR_KEYS {
        if matches!(parsed.get(key), Some(MetaValue::Flag)) {
            return Err(syn::Error::new_spanned(
                field,
                format!("{} expects a string literal: {} = \"...\"", key, key),
            ));
        }
    }

    let role = match (flag("extends"), flag("skip")) {
        (true, true) => {
            return Err(syn::Error::new_spanned(
                field,
                "a field cannot be both extends and skip",
            ));
        }
        (true, false) => FieldRole::Extends,
        (false, true) => FieldRole::Skip,
        (false, false) => FieldRole::Managed,
    };

    if role == FieldRole::Extends && parsed.len() > 1 {
        return Err(syn::Error::new_spanned(
            field,
            "extends cannot be combined with other options",
        ));
    }

    let kinds: Vec<&'static str> = KIND_FLAGS
        .iter()
        .filter(|entry| flag(entry.0))
        .map(|entry| entry.1)
        .collect();
    if kinds.len() > 1 {
        return Err(syn::Error::new_spanned(
            field,
            "only one of string, number, boolean, object or secret may be given",
        ));
    }

    if flag("optional") && flag("required") {
        return Err(syn::Error::new_spanned(
            field,
            "a field cannot be both optional and required",
        ));
    }

    if flag("no_default") {
        return Err(syn::Error::new_spanned(
            field,
            "no_default is a struct-level option",
        ));
    }

    Ok(FieldConfig {
        role,
        kind: kinds.first().copied(),
        optional: flag("optional"),
        unset: flag("unset"),
        env_name: string("name"),
        separator: string("separator"),
        description: string("doc").or_else(|| doc_comment(&field.attrs)),
        validator: expr("validator"),
        default: expr("default"),
    })
}

/// Build the `FieldOptions` expression for a managed field
fn field_options(config: &FieldConfig, ty: &Type) -> proc_macro2::TokenStream {
    let separated = config.separator.as_deref().is_some_and(|s| !s.is_empty());
    let kind = config.kind.unwrap_or_else(|| infer_kind(ty, separated));
    let kind = Ident::new(kind, proc_macro2::Span::call_site());

    let mut options = quote! {
        ::envprop::FieldOptions::new(::envprop::KnownType::#kind)
    };
    if config.optional {
        options = quote! { #options.optional() };
    }
    if config.unset {
        options = quote! { #options.unset() };
    }
    if let Some(name) = &config.env_name {
        options = quote! { #options.env_name(#name) };
    }
    if let Some(separator) = &config.separator {
        options = quote! { #options.separator(#separator) };
    }
    if let Some(validator) = &config.validator {
        options = quote! { #options.validator(#validator) };
    }
    if let Some(description) = &config.description {
        options = quote! { #options.description(#description) };
    }
    options
}

/// Upper-cased field identifier, the default variable name
fn registry_key(ident: &Ident) -> String {
    let name = ident.to_string();
    name.trim_start_matches("r#").to_uppercase()
}

/// Join `///` comments into a single description
fn doc_comment(attrs: &[Attribute]) -> Option<String> {
    let lines: Vec<String> = attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            Meta::NameValue(nv) => match &nv.value {
                Expr::Lit(syn::ExprLit {
                    lit: syn::Lit::Str(s),
                    ..
                }) => Some(s.value().trim().to_string()),
                _ => None,
            },
            _ => None,
        })
        .filter(|line| !line.is_empty())
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join(" "))
    }
}

/// Kind implied by a field's Rust type when none is given
fn infer_kind(ty: &Type, separated: bool) -> &'static str {
    let (is_option, ty) = extract_option_type(ty);
    if is_option {
        return infer_kind(ty, separated);
    }

    if let Some(inner) = extract_generic(ty, "Vec") {
        return if separated {
            infer_kind(inner, false)
        } else {
            "Object"
        };
    }

    match last_segment(ty).as_deref() {
        Some("String" | "str" | "char" | "PathBuf") => "String",
        Some(
            "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64"
            | "u128" | "usize" | "f32" | "f64",
        ) => "Number",
        Some("bool") => "Boolean",
        _ => "Object",
    }
}

fn last_segment(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .map(|segment| segment.ident.to_string()),
        Type::Reference(reference) => last_segment(&reference.elem),
        _ => None,
    }
}

/// Extract `T` from `Wrapper<T>` when the last path segment is `wrapper`
fn extract_generic<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    if let Type::Path(type_path) = ty
        && let Some(segment) = type_path.path.segments.last()
        && segment.ident == wrapper
        && let syn::PathArguments::AngleBracketed(args) = &segment.arguments
        && let Some(syn::GenericArgument::Type(inner_ty)) = args.args.first()
    {
        return Some(inner_ty);
    }
    None
}

/// Extract the inner type from Option<T>, returns (is_option, inner_type)
fn extract_option_type(ty: &Type) -> (bool, &Type) {
    match extract_generic(ty, "Option") {
        Some(inner) => (true, inner),
        None => (false, ty),
    }
}

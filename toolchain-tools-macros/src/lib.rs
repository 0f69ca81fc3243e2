//! Procedural macros for toolchain tool definitions.
//!
//! `#[tool]` keeps the annotated function untouched and emits, next to it, a
//! `<name>_tool()` factory returning a `ToolEntry` plus a link-time
//! registration record picked up by `ToolRegistry::collected()`.

#![warn(missing_docs, clippy::pedantic)]

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{
    Attribute, Expr, ExprLit, FnArg, Ident, ItemFn, Lit, LitStr, Meta, Pat, Path, ReturnType,
    Token, Type, parse_macro_input, parse_quote,
};

/// Registers a function as a tool.
///
/// ```ignore
/// /// Get the current weather in a given location.
/// #[tool]
/// fn get_weather(location: String, #[param(default = "celsius")] unit: String) -> String {
///     format!("Weather in {location}: 22 degrees {unit}")
/// }
/// ```
///
/// Accepted forms:
///
/// * `#[tool]` names the tool after the function.
/// * `#[tool("custom_name")]` or `#[tool(name = "custom_name")]` overrides it.
/// * `crate = "path::to::toolchain_tools"` names the runtime crate when it is
///   reached through a re-export such as `openai_toolchain::tools`.
/// * Any other `key = literal` pair is stored as metadata.
///
/// Doc comments become the description. Parameters accept
/// `#[param(default = ..., description = "...")]`; `Option<T>` parameters
/// default to `null`. The function may be `async` and may return a `Result`
/// whose error converts into `BoxError`.
#[proc_macro_attribute]
pub fn tool(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as ToolArgs);
    let function = parse_macro_input!(item as ItemFn);
    expand(args, function)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

#[derive(Default)]
struct ToolArgs {
    name: Option<LitStr>,
    krate: Option<Path>,
    metadata: Vec<(String, Lit)>,
}

struct KeyValue {
    key: Ident,
    value: Lit,
}

impl Parse for KeyValue {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let key = Ident::parse_any(input)?;
        input.parse::<Token![=]>()?;
        let value = input.parse()?;
        Ok(Self { key, value })
    }
}

impl Parse for ToolArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut args = Self::default();

        if input.peek(LitStr) {
            args.name = Some(input.parse()?);
            if !input.is_empty() {
                input.parse::<Token![,]>()?;
            }
        }

        for pair in Punctuated::<KeyValue, Token![,]>::parse_terminated(input)? {
            let key = pair.key.unraw().to_string();
            if key == "crate" {
                let Lit::Str(path) = &pair.value else {
                    return Err(syn::Error::new_spanned(
                        &pair.value,
                        "crate path must be a string literal",
                    ));
                };
                args.krate = Some(path.parse()?);
                continue;
            }
            if key != "name" {
                args.metadata.push((key, pair.value));
                continue;
            }
            if args.name.is_some() {
                return Err(syn::Error::new_spanned(pair.key, "tool name given twice"));
            }
            match pair.value {
                Lit::Str(name) => args.name = Some(name),
                other => {
                    return Err(syn::Error::new_spanned(
                        other,
                        "tool name must be a string literal",
                    ));
                }
            }
        }

        Ok(args)
    }
}

#[derive(Default)]
struct ParamOptions {
    default: Option<Expr>,
    description: Option<LitStr>,
}

struct Param {
    ident: Ident,
    ty: Type,
    options: ParamOptions,
}

fn expand(args: ToolArgs, mut function: ItemFn) -> syn::Result<TokenStream2> {
    let sig = &function.sig;
    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &sig.generics,
            "#[tool] functions cannot be generic",
        ));
    }

    let mut params = Vec::with_capacity(sig.inputs.len());
    for input in &mut function.sig.inputs {
        let typed = match input {
            FnArg::Typed(typed) => typed,
            FnArg::Receiver(receiver) => {
                return Err(syn::Error::new_spanned(
                    receiver,
                    "#[tool] cannot be applied to methods taking `self`",
                ));
            }
        };
        let Pat::Ident(pat) = typed.pat.as_ref() else {
            return Err(syn::Error::new_spanned(
                &typed.pat,
                "tool parameters must be plain identifiers",
            ));
        };
        let options = take_param_options(&mut typed.attrs)?;
        params.push(Param {
            ident: pat.ident.clone(),
            ty: (*typed.ty).clone(),
            options,
        });
    }

    let krate = args
        .krate
        .unwrap_or_else(|| parse_quote!(::toolchain_tools));
    let fn_ident = &function.sig.ident;
    let vis = &function.vis;
    let factory = format_ident!("{}_tool", fn_ident.unraw());
    let tool_name = args
        .name
        .map_or_else(|| fn_ident.unraw().to_string(), |name| name.value());
    let description = doc_text(&function.attrs);

    let specs = params.iter().map(|param| parameter_spec(&krate, param));
    let metadata = args
        .metadata
        .iter()
        .map(|(key, value)| metadata_entry(key, value))
        .collect::<syn::Result<Vec<_>>>()?;
    let body = invoke_body(&krate, &function, &params);

    Ok(quote! {
        #function

        #[doc = concat!("Builds the registry entry for the `", #tool_name, "` tool.")]
        #vis fn #factory() -> #krate::ToolEntry {
            async fn __invoke_tool(
                __tool_args: #krate::ToolArguments,
            ) -> ::core::result::Result<
                #krate::__private::serde_json::Value,
                #krate::BoxError,
            > {
                #body
            }

            #krate::ToolBuilder::new(#tool_name)
                .description(#description)
                #(.parameter(#specs))*
                #(#metadata)*
                .build(__invoke_tool)
        }

        #krate::__private::inventory::submit! {
            #krate::ToolBinding::new(
                #factory,
                #krate::SourceLocation::new(
                    ::core::module_path!(),
                    ::core::file!(),
                    ::core::line!(),
                    ::core::column!(),
                ),
            )
        }
    })
}

fn take_param_options(attrs: &mut Vec<Attribute>) -> syn::Result<ParamOptions> {
    let mut options = ParamOptions::default();
    let mut error: Option<syn::Error> = None;

    attrs.retain(|attr| {
        if !attr.path().is_ident("param") {
            return true;
        }
        let parsed = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("default") {
                options.default = Some(meta.value()?.parse()?);
                Ok(())
            } else if meta.path.is_ident("description") {
                options.description = Some(meta.value()?.parse()?);
                Ok(())
            } else {
                Err(meta.error("expected `default` or `description`"))
            }
        });
        if let Err(err) = parsed {
            if let Some(existing) = error.as_mut() {
                existing.combine(err);
            } else {
                error = Some(err);
            }
        }
        false
    });

    match error {
        Some(err) => Err(err),
        None => Ok(options),
    }
}

fn parameter_spec(krate: &Path, param: &Param) -> TokenStream2 {
    let name = param.ident.unraw().to_string();
    let annotation = annotation_text(&param.ty);

    let default = param
        .options
        .default
        .as_ref()
        .map(|expr| quote!(.with_default(#krate::__private::serde_json::json!(#expr))));
    let description = param
        .options
        .description
        .as_ref()
        .map(|text| quote!(.with_description(#text)));

    quote! {
        #krate::ParameterSpec::new(#name)
            .with_annotation(#annotation)
            #default
            #description
    }
}

fn metadata_entry(key: &str, value: &Lit) -> syn::Result<TokenStream2> {
    let value = match value {
        Lit::Str(_) | Lit::Int(_) | Lit::Float(_) | Lit::Bool(_) => quote!(#value),
        Lit::Char(_) => quote!(::std::string::String::from(#value)),
        other => {
            return Err(syn::Error::new_spanned(
                other,
                "metadata values must be string, number, boolean or char literals",
            ));
        }
    };
    Ok(quote!(.metadata(#key, #value)))
}

fn invoke_body(krate: &Path, function: &ItemFn, params: &[Param]) -> TokenStream2 {
    let fn_ident = &function.sig.ident;

    let bindings = params.iter().map(|param| {
        let ident = &param.ident;
        let name = ident.unraw().to_string();
        match &param.ty {
            Type::Reference(reference) => {
                let elem = &reference.elem;
                let mutability = reference.mutability;
                quote! {
                    let #mutability #ident: <#elem as ::std::borrow::ToOwned>::Owned = __tool_args.get(#name)?;
                }
            }
            ty => quote! {
                let #ident: #ty = __tool_args.get(#name)?;
            },
        }
    });

    let call_args = params.iter().map(|param| {
        let ident = &param.ident;
        match &param.ty {
            Type::Reference(reference) if reference.mutability.is_some() => quote!(&mut #ident),
            Type::Reference(_) => quote!(&#ident),
            _ => quote!(#ident),
        }
    });

    let mut call = quote!(#fn_ident(#(#call_args),*));
    if function.sig.asyncness.is_some() {
        call = quote!(#call.await);
    }

    let finish = match &function.sig.output {
        ReturnType::Default => quote! {
            #call;
            ::core::result::Result::Ok(#krate::__private::serde_json::Value::Null)
        },
        ReturnType::Type(_, ty) if is_unit(ty) => quote! {
            #call;
            ::core::result::Result::Ok(#krate::__private::serde_json::Value::Null)
        },
        ReturnType::Type(_, ty) if last_segment_is(ty, "Result") => quote! {
            let output = #call?;
            #krate::__private::to_output(output)
        },
        ReturnType::Type(..) => quote! {
            #krate::__private::to_output(#call)
        },
    };

    quote! {
        #(#bindings)*
        #finish
    }
}

fn doc_text(attrs: &[Attribute]) -> String {
    let lines: Vec<String> = attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            Meta::NameValue(pair) => match &pair.value {
                Expr::Lit(ExprLit {
                    lit: Lit::Str(text),
                    ..
                }) => Some(text.value()),
                _ => None,
            },
            _ => None,
        })
        .map(|line| line.strip_prefix(' ').map(str::to_owned).unwrap_or(line))
        .collect();

    lines.join("\n").trim().to_owned()
}

// Token streams print as `Option < & str >`; keep spaces only between words.
fn annotation_text(ty: &Type) -> String {
    let printed = quote!(#ty).to_string();
    let mut text = String::with_capacity(printed.len());
    for token in printed.split_whitespace() {
        let joins_words = text.chars().next_back().is_some_and(is_word_char)
            && token.chars().next().is_some_and(is_word_char);
        if joins_words {
            text.push(' ');
        }
        text.push_str(token);
    }
    text.replace(',', ", ")
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '\''
}

fn is_unit(ty: &Type) -> bool {
    matches!(ty, Type::Tuple(tuple) if tuple.elems.is_empty())
}

fn last_segment_is(ty: &Type, name: &str) -> bool {
    match ty {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == name),
        _ => false,
    }
}

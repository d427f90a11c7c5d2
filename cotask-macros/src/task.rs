//! Implementation of the `#[task]` and `#[detached]` attributes.
//!
//! Both rewrite an `async fn` into a plain `fn` that returns an unstarted
//! task wrapping the original body. The frame name recorded in traces is
//! the function's path unless a `name = "..."` argument overrides it.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    Error, GenericArgument, ItemFn, LitStr, PathArguments, ReturnType, Token, Type,
    parse::{Parse, ParseStream},
    parse_macro_input,
};

/// Which task type the attribute produces.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Flavor {
    /// `#[task]`: a `cotask::Task` returned to an awaiter.
    Task,
    /// `#[detached]`: a `cotask::DetachedTask` root.
    Detached,
}

impl Flavor {
    const fn attr(self) -> &'static str {
        match self {
            Self::Task => "#[task]",
            Self::Detached => "#[detached]",
        }
    }
}

/// Arguments accepted inside the attribute.
///
/// Supported forms:
/// - `#[task]`
/// - `#[task(env = MyEnv)]`
/// - `#[task(name = "label")]`
/// - `#[task(env = MyEnv, name = "label")]`
#[derive(Default)]
struct TaskArgs {
    env: Option<Type>,
    name: Option<LitStr>,
}

impl Parse for TaskArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut args = Self::default();
        while !input.is_empty() {
            let key: syn::Ident = input.parse()?;
            input.parse::<Token![=]>()?;
            match key.to_string().as_str() {
                "env" if args.env.is_none() => args.env = Some(input.parse()?),
                "name" if args.name.is_none() => args.name = Some(input.parse()?),
                "env" | "name" => {
                    return Err(Error::new(key.span(), format!("duplicate `{key}` argument")));
                }
                _ => {
                    return Err(Error::new(
                        key.span(),
                        "unknown argument; expected `env = Type` or `name = \"...\"`",
                    ));
                }
            }
            if input.is_empty() {
                break;
            }
            input.parse::<Token![,]>()?;
        }
        Ok(args)
    }
}

/// Entry point shared by both attributes.
pub fn task_impl(flavor: Flavor, attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as TaskArgs);
    let function = parse_macro_input!(item as ItemFn);
    match generate(flavor, &args, function) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn generate(flavor: Flavor, args: &TaskArgs, function: ItemFn) -> syn::Result<TokenStream2> {
    let ItemFn {
        attrs,
        vis,
        mut sig,
        block,
    } = function;

    if sig.asyncness.is_none() {
        return Err(Error::new_spanned(
            sig.fn_token,
            format!("{} requires an `async fn`", flavor.attr()),
        ));
    }
    let (written, value) = result_value_type(flavor, &sig.output)?;
    if flavor == Flavor::Detached && !is_unit(&value) {
        return Err(Error::new_spanned(
            &value,
            "#[detached] functions must return `Result<()>`; nothing awaits their value",
        ));
    }

    let ident = &sig.ident;
    let name = args.name.as_ref().map_or_else(
        || quote! { ::core::concat!(::core::module_path!(), "::", ::core::stringify!(#ident)) },
        |lit| quote! { #lit },
    );
    sig.asyncness = None;

    let (output, constructor) = match (flavor, &args.env) {
        (Flavor::Task, None) => (
            quote! { ::cotask::Task<#value> },
            quote! { ::cotask::Task::named },
        ),
        (Flavor::Task, Some(env)) => (
            quote! { ::cotask::Task<#value, #env> },
            quote! { ::cotask::Task::<#value, #env>::named_with_env },
        ),
        (Flavor::Detached, None) => (
            quote! { ::cotask::DetachedTask },
            quote! { ::cotask::DetachedTask::named },
        ),
        (Flavor::Detached, Some(env)) => {
            return Err(Error::new_spanned(
                env,
                "#[detached] roots always use `cotask::DetachedEnv`",
            ));
        }
    };
    sig.output = syn::parse_quote! { -> #output };

    // The body keeps the written return type so its `Result` path stays in use.
    Ok(quote! {
        #(#attrs)*
        #vis #sig {
            fn __cotask_body<R, F: ::core::future::Future<Output = R>>(future: F) -> F {
                future
            }
            #constructor(#name, __cotask_body::<#written, _>(async move #block))
        }
    })
}

fn is_unit(ty: &Type) -> bool {
    matches!(ty, Type::Tuple(tuple) if tuple.elems.is_empty())
}

/// Splits `-> Result<T>` (any path ending in `Result`) into the written
/// type and `T`.
fn result_value_type(flavor: Flavor, output: &ReturnType) -> syn::Result<(Type, Type)> {
    let not_result = || {
        Error::new_spanned(
            output,
            format!(
                "{} functions must return `Result<T>`; the error travels to the awaiter",
                flavor.attr()
            ),
        )
    };
    let ReturnType::Type(_, ty) = output else {
        return Err(not_result());
    };
    let Type::Path(path) = ty.as_ref() else {
        return Err(not_result());
    };
    let Some(last) = path.path.segments.last() else {
        return Err(not_result());
    };
    if last.ident != "Result" {
        return Err(not_result());
    }
    let PathArguments::AngleBracketed(generics) = &last.arguments else {
        return Err(not_result());
    };
    let mut args = generics.args.iter();
    let Some(GenericArgument::Type(value)) = args.next() else {
        return Err(not_result());
    };
    if let Some(extra) = args.next() {
        return Err(Error::new_spanned(
            extra,
            format!(
                "{} functions raise `cotask::Error`; write `cotask::Result<T>` without an error type",
                flavor.attr()
            ),
        ));
    }
    Ok((ty.as_ref().clone(), value.clone()))
}

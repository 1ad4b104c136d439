//! Procedural macros used by `fingercount`.
//!
//! Do not use this crate directly, use `fingercount` instead.

use proc_macro::{Span, TokenStream};
use quote::quote;
use syn::{parse::Error, ItemFn};

/// Turns `main` into the application entry point.
///
/// The annotated function runs on a background thread while the main thread drives the window
/// event loop. Logging is initialized before the function is called.
#[proc_macro_attribute]
pub fn main(args: TokenStream, item: TokenStream) -> TokenStream {
    match expand_main(args, item.clone()) {
        Ok(tokens) => tokens,
        Err(err) => {
            // Emit the `compile_error!` invocation, alongside the original item, in an attempt to
            // improve IDE support.
            let mut error = item;
            error.extend(TokenStream::from(err.to_compile_error()));
            error
        }
    }
}

fn expand_main(args: TokenStream, item: TokenStream) -> syn::Result<TokenStream> {
    if !args.is_empty() {
        return Err(Error::new(
            Span::call_site().into(),
            "`#[fingercount::main]` does not accept arguments",
        ));
    }

    let item = syn::parse::<ItemFn>(item)?;

    if item.sig.ident != "main" {
        return Err(Error::new(
            item.sig.ident.span(),
            "`#[fingercount::main]` must be applied to a function called `main`",
        ));
    }

    if item.sig.asyncness.is_some() {
        return Err(Error::new(
            item.sig.asyncness.as_ref().map_or(item.sig.ident.span(), |a| a.span),
            "`#[fingercount::main]` cannot be applied to `async fn`",
        ));
    }

    Ok(quote! {
        fn main() {
            #item

            ::fingercount::init_logger!();

            ::fingercount::run(main);
        }
    }
    .into())
}

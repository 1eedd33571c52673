use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::parse::Parser;
use syn::punctuated::Punctuated;
use syn::{Expr, Ident, ItemStruct, Lit, LitStr, Meta, Token};

/// Role names accepted by `#[component(role = "...")]`, paired with the capability they expose.
const ROLES: &[(&str, &str, &str)] = &[
    ("system", "System", "as_system"),
    ("preprocess", "Preprocess", "as_preprocess"),
    ("solver", "Solver", "as_solver"),
    ("postprocess", "Postprocess", "as_postprocess"),
    ("optimize", "Optimize", "as_optimize"),
    ("workflow", "Workflow", "as_workflow"),
];

#[derive(Default)]
struct ComponentArgs {
    role: Option<LitStr>,
    name: Option<LitStr>,
    type_name: Option<LitStr>,
    tasks: Vec<Ident>,
    jobs: Vec<Ident>,
}

fn string_value(expr: &Expr) -> Result<LitStr, TokenStream> {
    match expr {
        Expr::Lit(lit) => match &lit.lit {
            Lit::Str(s) => Ok(s.clone()),
            _ => Err(syn::Error::new_spanned(expr, "Expected a string literal").to_compile_error()),
        },
        _ => Err(syn::Error::new_spanned(expr, "Expected a string literal").to_compile_error()),
    }
}

fn method_list(list: &syn::MetaList) -> Result<Vec<Ident>, TokenStream> {
    list.parse_args_with(Punctuated::<Ident, Token![,]>::parse_terminated)
        .map(|idents| idents.into_iter().collect())
        .map_err(|err| err.to_compile_error())
}

fn parse_args(args: TokenStream) -> Result<ComponentArgs, TokenStream> {
    let metas = Punctuated::<Meta, Token![,]>::parse_terminated
        .parse2(args)
        .map_err(|err| err.to_compile_error())?;

    let mut out = ComponentArgs::default();
    for meta in metas {
        match &meta {
            Meta::NameValue(nv) if nv.path.is_ident("role") => {
                out.role = Some(string_value(&nv.value)?);
            },
            Meta::NameValue(nv) if nv.path.is_ident("name") => {
                out.name = Some(string_value(&nv.value)?);
            },
            Meta::NameValue(nv) if nv.path.is_ident("type_name") => {
                out.type_name = Some(string_value(&nv.value)?);
            },
            Meta::List(list) if list.path.is_ident("tasks") => out.tasks = method_list(list)?,
            Meta::List(list) if list.path.is_ident("jobs") => out.jobs = method_list(list)?,
            other => {
                return Err(syn::Error::new_spanned(
                    other,
                    "Supported arguments: role = \"..\", name = \"..\", type_name = \"..\", tasks(..), jobs(..)",
                )
                .to_compile_error());
            },
        }
    }
    Ok(out)
}

pub fn expand_component(args: TokenStream, input: ItemStruct) -> TokenStream {
    let args = match parse_args(args) {
        Ok(args) => args,
        Err(err) => return err,
    };

    let Some(role) = args.role else {
        return syn::Error::new_spanned(&input.ident, "component requires `role = \"...\"`")
            .to_compile_error();
    };
    let Some(&(_, variant, accessor)) = ROLES.iter().find(|(r, _, _)| *r == role.value()) else {
        return syn::Error::new_spanned(
            &role,
            "Unknown role; expected one of system, preprocess, solver, postprocess, optimize, workflow",
        )
        .to_compile_error();
    };
    let Some(name) = args.name else {
        return syn::Error::new_spanned(&input.ident, "component requires `name = \"...\"`")
            .to_compile_error();
    };

    let ident = &input.ident;
    let type_name =
        args.type_name.unwrap_or_else(|| LitStr::new(&ident.to_string(), Span::call_site()));
    let variant = Ident::new(variant, Span::call_site());
    let accessor = Ident::new(accessor, Span::call_site());
    let capability = variant.clone();

    let task_names: Vec<String> = args.tasks.iter().map(ToString::to_string).collect();
    let task_idents = &args.tasks;
    let job_names: Vec<String> = args.jobs.iter().map(ToString::to_string).collect();
    let job_idents = &args.jobs;

    let optimize_mut = (variant == "Optimize").then(|| {
        quote! {
            fn as_optimize_mut(&mut self) -> Option<&mut dyn ::seis_kernel::contract::Optimize> {
                Some(self)
            }
        }
    });

    quote! {
        #input

        impl ::seis_kernel::component::Describe for #ident {
            const ROLE: ::seis_kernel::domain::Role = ::seis_kernel::domain::Role::#variant;
            const NAME: &'static str = #name;
            const TYPE_NAME: &'static str = #type_name;
        }

        impl ::seis_kernel::component::Component for #ident {
            fn role(&self) -> ::seis_kernel::domain::Role {
                ::seis_kernel::domain::Role::#variant
            }

            fn name(&self) -> &'static str {
                #name
            }

            fn type_name(&self) -> &'static str {
                #type_name
            }

            fn snapshot(&self) -> Result<Vec<u8>, ::seis_kernel::KernelError> {
                ::seis_kernel::adapter::encode_state(self)
            }

            fn tasks(&self) -> &'static [&'static str] {
                &[#(#task_names),*]
            }

            fn jobs(&self) -> &'static [&'static str] {
                &[#(#job_names),*]
            }

            fn run_task(
                &mut self,
                task: &str,
                session: &mut ::seis_kernel::Session,
            ) -> Option<Result<(), ::seis_kernel::KernelError>> {
                match task {
                    #( #task_names => Some(self.#task_idents(session)), )*
                    _ => {
                        let _ = session;
                        None
                    },
                }
            }

            fn run_job(
                &mut self,
                job: &str,
                ctx: &::seis_kernel::contract::WorkerContext,
            ) -> Option<Result<(), ::seis_kernel::KernelError>> {
                match job {
                    #( #job_names => Some(self.#job_idents(ctx)), )*
                    _ => {
                        let _ = ctx;
                        None
                    },
                }
            }

            fn as_any(&self) -> &dyn std::any::Any {
                self
            }

            fn #accessor(&self) -> Option<&dyn ::seis_kernel::contract::#capability> {
                Some(self)
            }

            #optimize_mut
        }
    }
}

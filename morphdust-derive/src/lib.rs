//! Derive macros for the morphdust particle engine.
//!
//! This crate provides two derive macros:
//!
//! - [`WgslStruct`] - Generates a GPU-compatible uniform struct and its WGSL definition
//! - [`GpuEnum`] - Maps unit enums to `u32` codes that shaders can switch on
//!
//! # Usage
//!
//! These macros are re-exported from the main `morphdust` crate. You don't need
//! to add this crate directly:
//!
//! ```ignore
//! use morphdust::{GpuEnum, WgslStruct};
//!
//! #[derive(WgslStruct, Clone, Copy)]
//! struct StepParams {
//!     center: Vec3,
//!     strength: f32,
//! }
//!
//! #[derive(GpuEnum, Clone, Copy, PartialEq)]
//! enum Falloff {
//!     Linear,
//!     Smooth,
//! }
//! ```
//!
//! # Uniform Memory Layout
//!
//! WGSL uniform buffers have strict alignment requirements that differ from Rust.
//! `WgslStruct` inserts padding so the generated `{Name}Gpu` struct matches the
//! WGSL layout byte for byte:
//!
//! - `Vec3` and `Vec4` require 16-byte alignment
//! - `Vec2` requires 8-byte alignment
//! - Total size is rounded up to a multiple of 16 bytes

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, Ident, Type};

/// Derive macro for enums passed to shaders as integer codes.
///
/// Variants are assigned sequential IDs starting from 0.
///
/// # Generated Items
///
/// For an enum `Mode`:
///
/// - `impl From<Mode> for u32` - Convert variant to integer
/// - `impl From<u32> for Mode` - Convert integer to variant (invalid values default to first variant)
/// - `Mode::count() -> u32` - Returns number of variants
/// - `Mode::WGSL_CONSTANTS` - `const` declarations naming every code, e.g. `MODE_SMOOTH`
///
/// # Panics
///
/// The macro panics at compile time if:
/// - Applied to a struct instead of an enum
/// - Any variant has fields
/// - Enum has zero variants
#[proc_macro_derive(GpuEnum)]
pub fn derive_gpu_enum(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    let variants = match &input.data {
        Data::Enum(data) => &data.variants,
        _ => panic!("GpuEnum derive only supports enums"),
    };

    for variant in variants.iter() {
        if !matches!(variant.fields, Fields::Unit) {
            panic!(
                "GpuEnum variants must be unit variants (no fields). \
                 Found fields on variant '{}'",
                variant.ident
            );
        }
    }

    let into_arms: Vec<_> = variants
        .iter()
        .enumerate()
        .map(|(i, variant)| {
            let variant_name = &variant.ident;
            let idx = i as u32;
            quote! { #name::#variant_name => #idx }
        })
        .collect();

    let from_arms: Vec<_> = variants
        .iter()
        .enumerate()
        .map(|(i, variant)| {
            let variant_name = &variant.ident;
            let idx = i as u32;
            quote! { #idx => #name::#variant_name }
        })
        .collect();

    let first_variant = &variants
        .first()
        .expect("Enum must have at least one variant")
        .ident;
    let variant_count = variants.len() as u32;

    let prefix = screaming_snake(&name.to_string());
    let wgsl_constants: String = variants
        .iter()
        .enumerate()
        .map(|(i, variant)| {
            format!(
                "const {}_{}: u32 = {}u;\n",
                prefix,
                screaming_snake(&variant.ident.to_string()),
                i
            )
        })
        .collect();

    let expanded = quote! {
        impl From<#name> for u32 {
            fn from(value: #name) -> u32 {
                match value {
                    #(#into_arms),*
                }
            }
        }

        impl From<u32> for #name {
            fn from(value: u32) -> #name {
                match value {
                    #(#from_arms,)*
                    _ => #name::#first_variant,
                }
            }
        }

        impl #name {
            /// Returns the number of variants in this enum.
            pub const fn count() -> u32 {
                #variant_count
            }

            /// WGSL `const` declarations for every variant code.
            pub const WGSL_CONSTANTS: &'static str = #wgsl_constants;
        }
    };

    TokenStream::from(expanded)
}

/// Derive macro for uniform structs shared between Rust and WGSL.
///
/// Generates:
///
/// - A companion `{Name}Gpu` struct with `#[repr(C)]`, `bytemuck::Pod` and WGSL-compatible padding
/// - An implementation of `morphdust::WgslStruct`
/// - The WGSL struct definition as a const string
///
/// # Supported Types
///
/// | Rust Type | WGSL Type | Size | Alignment |
/// |-----------|-----------|------|-----------|
/// | `Vec4` | `vec4<f32>` | 16 bytes | 16 bytes |
/// | `Vec3` | `vec3<f32>` | 12 bytes | 16 bytes |
/// | `Vec2` | `vec2<f32>` | 8 bytes | 8 bytes |
/// | `f32` | `f32` | 4 bytes | 4 bytes |
/// | `u32` | `u32` | 4 bytes | 4 bytes |
/// | `i32` | `i32` | 4 bytes | 4 bytes |
///
/// # Generated Code
///
/// For a struct `Params { center: Vec3, radius: f32, mode: u32 }`:
///
/// ```ignore
/// #[repr(C)]
/// #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
/// pub struct ParamsGpu {
///     pub center: [f32; 3],
///     pub radius: f32,
///     pub mode: u32,
///     pub _pad0: f32,
///     pub _pad1: f32,
///     pub _pad2: f32,
/// }
/// ```
///
/// # Panics
///
/// The macro panics at compile time if:
/// - Applied to an enum instead of a struct
/// - Struct uses tuple fields instead of named fields
/// - Any field has an unsupported type
#[proc_macro_derive(WgslStruct)]
pub fn derive_wgsl_struct(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let name_str = name.to_string();
    let gpu_name = Ident::new(&format!("{}Gpu", name), Span::call_site());

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => panic!("WgslStruct derive only supports structs with named fields"),
        },
        _ => panic!("WgslStruct derive only supports structs"),
    };

    let mut wgsl_fields = Vec::new();
    let mut gpu_struct_fields = Vec::new();
    let mut to_gpu_conversions = Vec::new();
    let mut field_offset = 0u32;
    let mut padding_count = 0u32;

    // Scalar pads only: `array<f32, N>` has a 16-byte stride in uniform space.
    let mut push_padding = |bytes: u32,
                            wgsl_fields: &mut Vec<String>,
                            gpu_struct_fields: &mut Vec<proc_macro2::TokenStream>,
                            to_gpu_conversions: &mut Vec<proc_macro2::TokenStream>| {
        for _ in 0..bytes / 4 {
            let pad_name_str = format!("_pad{}", padding_count);
            let pad_name = Ident::new(&pad_name_str, Span::call_site());
            padding_count += 1;
            wgsl_fields.push(format!("    {}: f32,", pad_name_str));
            gpu_struct_fields.push(quote! { #pad_name: f32 });
            to_gpu_conversions.push(quote! { #pad_name: 0.0 });
        }
    };

    for field in fields.iter() {
        let field_name = field.ident.as_ref().unwrap();
        let field_name_str = field_name.to_string();
        let type_info = rust_type_info(&field.ty);

        let padding_needed = (type_info.align - (field_offset % type_info.align)) % type_info.align;
        if padding_needed > 0 {
            push_padding(
                padding_needed,
                &mut wgsl_fields,
                &mut gpu_struct_fields,
                &mut to_gpu_conversions,
            );
            field_offset += padding_needed;
        }

        wgsl_fields.push(format!("    {}: {},", field_name_str, type_info.wgsl_type));

        let gpu_field_type = type_info.gpu_type;
        gpu_struct_fields.push(quote! { #field_name: #gpu_field_type });

        let conversion = generate_conversion(field_name, &field.ty);
        to_gpu_conversions.push(quote! { #field_name: #conversion });

        field_offset += type_info.size;
    }

    let final_padding = (16 - (field_offset % 16)) % 16;
    if final_padding > 0 {
        push_padding(
            final_padding,
            &mut wgsl_fields,
            &mut gpu_struct_fields,
            &mut to_gpu_conversions,
        );
        field_offset += final_padding;
    }

    let wgsl_struct = format!("struct {} {{\n{}\n}};\n", name_str, wgsl_fields.join("\n"));
    let gpu_size = field_offset as usize;

    let expanded = quote! {
        #[repr(C)]
        #[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
        pub struct #gpu_name {
            #(pub #gpu_struct_fields),*
        }

        const _: () = assert!(
            ::core::mem::size_of::<#gpu_name>() == #gpu_size,
            "WgslStruct layout mismatch"
        );

        impl morphdust::WgslStruct for #name {
            type Gpu = #gpu_name;

            const WGSL_NAME: &'static str = #name_str;
            const WGSL_STRUCT: &'static str = #wgsl_struct;

            fn to_gpu(&self) -> Self::Gpu {
                #gpu_name {
                    #(#to_gpu_conversions),*
                }
            }
        }
    };

    TokenStream::from(expanded)
}

/// Type metadata for GPU memory layout calculations.
struct TypeInfo {
    /// WGSL type name (e.g., "vec3<f32>")
    wgsl_type: &'static str,
    /// Rust type for the GPU struct (e.g., `[f32; 3]`)
    gpu_type: proc_macro2::TokenStream,
    /// Size in bytes
    size: u32,
    /// Required alignment in bytes
    align: u32,
}

fn rust_type_info(ty: &Type) -> TypeInfo {
    let type_str = quote!(#ty).to_string().replace(' ', "");

    match type_str.as_str() {
        "Vec4" | "glam::Vec4" => TypeInfo {
            wgsl_type: "vec4<f32>",
            gpu_type: quote! { [f32; 4] },
            size: 16,
            align: 16,
        },
        "Vec3" | "glam::Vec3" => TypeInfo {
            wgsl_type: "vec3<f32>",
            gpu_type: quote! { [f32; 3] },
            size: 12,
            align: 16,
        },
        "Vec2" | "glam::Vec2" => TypeInfo {
            wgsl_type: "vec2<f32>",
            gpu_type: quote! { [f32; 2] },
            size: 8,
            align: 8,
        },
        "f32" => TypeInfo {
            wgsl_type: "f32",
            gpu_type: quote! { f32 },
            size: 4,
            align: 4,
        },
        "u32" => TypeInfo {
            wgsl_type: "u32",
            gpu_type: quote! { u32 },
            size: 4,
            align: 4,
        },
        "i32" => TypeInfo {
            wgsl_type: "i32",
            gpu_type: quote! { i32 },
            size: 4,
            align: 4,
        },
        _ => panic!("Unsupported type in WgslStruct: {}", type_str),
    }
}

fn generate_conversion(field_name: &Ident, ty: &Type) -> proc_macro2::TokenStream {
    let type_str = quote!(#ty).to_string().replace(' ', "");

    match type_str.as_str() {
        "Vec4" | "glam::Vec4" | "Vec3" | "glam::Vec3" | "Vec2" | "glam::Vec2" => {
            quote! { self.#field_name.to_array() }
        }
        _ => quote! { self.#field_name },
    }
}

/// `PhaseMode` -> `PHASE_MODE`, `EdgeThenFill` -> `EDGE_THEN_FILL`.
fn screaming_snake(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len() + 4);
    for (i, ch) in ident.chars().enumerate() {
        if ch.is_uppercase() && i > 0 {
            out.push('_');
        }
        out.push(ch.to_ascii_uppercase());
    }
    out
}

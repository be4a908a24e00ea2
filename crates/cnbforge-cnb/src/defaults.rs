//! The `/cnb` defaults layer
//!
//! The lifecycle reads `/cnb/order.toml` for detection order and
//! `/cnb/stack.toml` for the run image at build time.

use serde::Serialize;

use cnbforge_core::{Layer, Order};

use crate::error::Result;

#[derive(Serialize)]
struct OrderToml<'a> {
    order: &'a Order,
}

#[derive(Serialize)]
struct StackToml<'a> {
    #[serde(rename = "run-image")]
    run_image: RunImageToml<'a>,
}

#[derive(Serialize)]
struct RunImageToml<'a> {
    image: &'a str,
}

pub fn order_toml(order: &Order) -> Result<String> {
    Ok(toml::to_string(&OrderToml { order })?)
}

pub fn stack_toml(run_image: &str) -> Result<String> {
    Ok(toml::to_string(&StackToml {
        run_image: RunImageToml { image: run_image },
    })?)
}

/// Build the defaults layer
///
/// Entries carry fixed ownership and timestamps so the layer digest depends
/// only on its content.
pub fn cnb_layer(order: &Order, run_image: &str) -> Result<Layer> {
    let mut builder = tar::Builder::new(Vec::new());

    append_dir(&mut builder, "cnb/")?;
    append_file(&mut builder, "cnb/order.toml", order_toml(order)?.as_bytes())?;
    append_file(&mut builder, "cnb/stack.toml", stack_toml(run_image)?.as_bytes())?;

    let tar = builder.into_inner()?;
    Ok(Layer::from_tar(&tar)?)
}

fn header(path: &str, entry_type: tar::EntryType, mode: u32, size: u64) -> std::io::Result<tar::Header> {
    let mut header = tar::Header::new_ustar();
    header.set_path(path)?;
    header.set_entry_type(entry_type);
    header.set_mode(mode);
    header.set_size(size);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mtime(0);
    header.set_cksum();
    Ok(header)
}

fn append_dir(builder: &mut tar::Builder<Vec<u8>>, path: &str) -> std::io::Result<()> {
    let header = header(path, tar::EntryType::Directory, 0o755, 0)?;
    builder.append(&header, std::io::empty())
}

fn append_file(builder: &mut tar::Builder<Vec<u8>>, path: &str, data: &[u8]) -> std::io::Result<()> {
    let header = header(path, tar::EntryType::Regular, 0o644, data.len() as u64)?;
    builder.append(&header, data)
}

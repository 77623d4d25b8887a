//! The binary dump is made of native-endian words:
//!
//! - a header `[MAGIC, light_count, node_count, MAGIC]` of `u32`,
//! - every light as its position, normal and intensity (9 × `f32`),
//! - every node in pre-order as the minimum and maximum of its box and its intensity (9 × `f32`)
//!   followed by its depth (`u32`).

use crate::{
    error::{Error, Result},
    tree::{LightTree, Node, NodeID},
};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

/// Magic word surrounding the counts of the binary dump header.
pub const MAGIC: u32 = 0x4455_6677;

impl LightTree {
    /// Walks the tree from the root in pre-order, left child first, calling `f` with the id of each
    /// node, its parent and its depth.
    fn walk_preorder<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(NodeID, Option<NodeID>, u32) -> Result<()>,
    {
        let root = self.root().ok_or(Error::EmptyTree)?;
        let mut stack = vec![(root, None, 0)];

        while let Some((id, parent, depth)) = stack.pop() {
            f(id, parent, depth)?;

            if let Node::Internal([left, right]) = self.node(id).children {
                stack.push((right, Some(id), depth + 1));
                stack.push((left, Some(id), depth + 1));
            }
        }

        Ok(())
    }

    /// Writes the binary dump of the tree.
    ///
    /// Fails with [`Error::EmptyTree`] if the tree is empty.
    pub fn write_binary<W: Write>(&self, mut writer: W) -> Result<()> {
        if self.is_empty() {
            return Err(Error::EmptyTree);
        }

        let header = [MAGIC, self.light_count() as u32, self.len() as u32, MAGIC];
        writer.write_all(bytemuck::cast_slice(&header))?;

        for light in &self.lights {
            writer.write_all(bytemuck::bytes_of(&[
                light.position,
                light.normal,
                light.intensity,
            ]))?;
        }

        self.walk_preorder(|id, _, depth| {
            let node = self.node(id);

            writer.write_all(bytemuck::bytes_of(&[node.aabb.min, node.aabb.max, node.intensity]))?;
            writer.write_all(bytemuck::bytes_of(&depth))?;
            Ok(())
        })
    }

    /// Writes the tree as a Graphviz directed graph, each node labelled with its intensity.
    ///
    /// Fails with [`Error::EmptyTree`] if the tree is empty.
    pub fn write_dot<W: Write>(&self, mut writer: W) -> Result<()> {
        if self.is_empty() {
            return Err(Error::EmptyTree);
        }

        writeln!(writer, "digraph G {{")?;
        writeln!(writer, "  graph [ordering=\"out\"];")?;

        self.walk_preorder(|id, parent, _| {
            let intensity = self.node(id).intensity;

            writeln!(
                writer,
                "  n{id} [label=\"vec3({:.2}, {:.2}, {:.2})\"]",
                intensity.x, intensity.y, intensity.z
            )?;

            if let Some(parent) = parent {
                writeln!(writer, "  n{parent} -> n{id}")?;
            }
            Ok(())
        })?;

        writeln!(writer, "}}")?;
        Ok(())
    }

    /// Writes the binary dump of the tree to the file at the given path.
    pub fn print_binary(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let mut writer = BufWriter::new(File::create(path)?);
        self.write_binary(&mut writer)?;
        writer.flush()?;

        log::info!("LightCuts: {} written", path.display());
        Ok(())
    }

    /// Writes the Graphviz dump of the tree to the file at the given path.
    pub fn print_dot(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let mut writer = BufWriter::new(File::create(path)?);
        self.write_dot(&mut writer)?;
        writer.flush()?;

        log::info!("LightCuts: {} written", path.display());
        Ok(())
    }
}

// Copyright (C) 2024 kitbash contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::compiler::diagnostics::DiagnosticKind;
use crate::compiler::output::{ParameterKind, ResourceKind};
use crate::compiler::GraphCompiler;
use crate::graph::{pin_names, ImageNode, NodeId, NodeKind, PinId};
use crate::ir::IrImage;
use crate::prelude::*;

impl<'g> GraphCompiler<'g> {
    pub fn generate_image(&mut self, pin: PinId) -> Option<Rc<IrImage>> {
        self.dispatch(pin, Self::build_image)
    }

    fn build_image(&mut self, pin: PinId) -> Option<Rc<IrImage>> {
        let graph = self.graph;
        let node_id = graph.owning_node(pin);
        let image = match &graph[node_id].kind {
            NodeKind::Image(image) => self.build_image_op(node_id, image)?,
            NodeKind::Table(_) => IrImage::Table(self.table_column(pin)?),
            NodeKind::Switch(switch) => {
                IrImage::Switch(self.build_switch(node_id, switch, Self::generate_image)?)
            }
            NodeKind::Variation(variation) => {
                IrImage::Variation(self.build_variation(node_id, variation, Self::generate_image))
            }
            _ => return self.unsupported(node_id, "images"),
        };
        Some(Rc::new(image))
    }

    fn build_image_op(&mut self, node_id: NodeId, image: &ImageNode) -> Option<IrImage> {
        let graph = self.graph;
        Some(match image {
            ImageNode::Asset { asset } => {
                let Some(meta) = graph.assets.images.get(asset) else {
                    self.diagnostics.error(
                        DiagnosticKind::Structural,
                        format!("{}: image asset '{asset}' not found", graph[node_id].label),
                        node_id,
                    );
                    return None;
                };
                let resource_index = meta
                    .streamable
                    .then(|| self.register_streamed(asset, ResourceKind::Image));
                IrImage::Asset {
                    asset: asset.clone(),
                    size: meta.size,
                    lod_bias: self.options.image_lod_bias(self.ctx.lod),
                    resource_index,
                }
            }
            ImageNode::Parameter {
                name,
                default_asset,
            } => {
                self.register_parameter(
                    name,
                    ParameterKind::Image {
                        default_asset: default_asset.clone(),
                    },
                    node_id,
                );
                IrImage::Parameter {
                    name: name.clone(),
                    default_asset: default_asset.clone(),
                }
            }
            ImageNode::PlainColor { color, size } => IrImage::PlainColor {
                color: *color,
                size: *size,
            },
            ImageNode::Layer { blend } => {
                let base = self.follow_required(node_id, pin_names::BASE);
                let blended = self.follow_required(node_id, pin_names::BLENDED);
                let (base, blended) = (base?, blended?);
                let base = self.generate_image(base)?;
                let blended = self.generate_image(blended)?;
                let mask = self
                    .follow_optional(node_id, pin_names::MASK)
                    .and_then(|source| self.generate_image(source));
                IrImage::Layer {
                    base,
                    blended,
                    mask,
                    blend: *blend,
                }
            }
            ImageNode::Resize { size } => {
                let base = self.follow_required(node_id, pin_names::BASE)?;
                IrImage::Resize {
                    base: self.generate_image(base)?,
                    size: *size,
                }
            }
        })
    }
}

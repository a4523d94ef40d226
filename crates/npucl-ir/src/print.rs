//! Textual form of types, values and the cluster-tiling wrapper.
//!
//! The printed form is the on-disk/debug representation; everything printed
//! here reparses to an identical operation (see `parse`).

use core::fmt::{Display, Formatter, Result as FmtResult};

use crate::{
    BufferType, ClusterTilingOp, DistributedBufferType, MemRefType, Operation, SparseBufferType,
    Value, ValueKind,
};

fn write_usize_list(f: &mut Formatter<'_>, values: &[usize]) -> FmtResult {
    write!(f, "[")?;
    for (idx, value) in values.iter().enumerate() {
        if idx > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{value}")?;
    }
    write!(f, "]")
}

impl Display for MemRefType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "memref<")?;
        for dim in self.shape.iter() {
            write!(f, "{dim}x")?;
        }
        write!(f, "{}, {}, {}", self.elem, self.order, self.memory)?;
        if let Some(strides) = &self.strides {
            write!(f, ", strides = ")?;
            write_usize_list(f, strides)?;
        }
        write!(f, ">")
    }
}

impl Display for DistributedBufferType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let dist = self.distribution();
        write!(
            f,
            "!npucl.distributed<{}, {{mode = \"{}\", num_clusters = {}",
            self.base(),
            dist.mode,
            dist.num_clusters
        )?;
        if let Some(num_tiles) = &dist.num_tiles {
            write!(f, ", num_tiles = ")?;
            write_usize_list(f, num_tiles)?;
        }
        if let Some(alignment) = &dist.alignment {
            write!(f, ", alignment = ")?;
            write_usize_list(f, alignment)?;
        }
        if let Some(overlap) = &dist.overlap {
            write!(f, ", kernel = ")?;
            write_usize_list(f, &overlap.kernel)?;
            write!(f, ", strides = ")?;
            write_usize_list(f, &overlap.strides)?;
            write!(f, ", pads = ")?;
            write_usize_list(
                f,
                &[
                    overlap.pads.top,
                    overlap.pads.bottom,
                    overlap.pads.left,
                    overlap.pads.right,
                ],
            )?;
        }
        write!(f, "}}>")
    }
}

impl Display for SparseBufferType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "!npucl.sparse<data = {}", self.data)?;
        if let Some(map) = &self.sparsity_map {
            write!(f, ", sparsity_map = {map}")?;
        }
        if let Some(table) = &self.storage_element_table {
            write!(f, ", storage_element_table = {table}")?;
        }
        write!(f, ">")
    }
}

impl Display for BufferType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            BufferType::MemRef(ty) => write!(f, "{ty}"),
            BufferType::Distributed(ty) => write!(f, "{ty}"),
            BufferType::Sparse(ty) => write!(f, "{ty}"),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self.kind {
            ValueKind::Operand(id) => write!(f, "%{id}"),
            ValueKind::BlockArg(id) => write!(f, "%arg{id}"),
            ValueKind::Local(id) => write!(f, "%t{id}"),
        }
    }
}

fn write_operand_list(f: &mut Formatter<'_>, operands: &[&Value]) -> FmtResult {
    write!(f, "(")?;
    for (idx, operand) in operands.iter().enumerate() {
        if idx > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{operand}")?;
    }
    write!(f, ")")
}

/// `{key = [..], ...}` with a fixed key order so printing is deterministic.
struct AttrDict<'a, 'f> {
    f: &'a mut Formatter<'f>,
    open: bool,
}

impl<'a, 'f> AttrDict<'a, 'f> {
    fn new(f: &'a mut Formatter<'f>) -> Self {
        Self { f, open: false }
    }

    fn key(&mut self, key: &str) -> FmtResult {
        if self.open {
            write!(self.f, ", ")?;
        } else {
            write!(self.f, " {{")?;
            self.open = true;
        }
        write!(self.f, "{key} = ")
    }

    fn usize_list(&mut self, key: &str, values: &[usize]) -> FmtResult {
        self.key(key)?;
        write_usize_list(self.f, values)
    }

    fn finish(self) -> FmtResult {
        if self.open {
            write!(self.f, "}}")?;
        }
        Ok(())
    }
}

fn write_op(f: &mut Formatter<'_>, index: usize, op: &Operation) -> FmtResult {
    if op.result_type().is_some() {
        write!(f, "%t{index} = ")?;
    }
    write!(f, "npucl.{}", op.name())?;

    match op {
        Operation::Yield(yield_op) => {
            for (idx, operand) in yield_op.operands.iter().enumerate() {
                write!(f, "{} {operand}", if idx > 0 { "," } else { "" })?;
            }
            return Ok(());
        }
        Operation::ComputeTask(task) => write!(f, " {}", task.task)?,
        _ => {}
    }

    let inputs = op.inputs();
    write_operand_list(f, &inputs)?;
    if let Some(buff) = op.output_buff() {
        write!(f, " outputs(")?;
        write!(f, "{buff}")?;
        write!(f, ")")?;
    }

    let mut attrs = AttrDict::new(f);
    match op {
        Operation::ComputeTask(task) => {
            if let Some(kernel) = &task.kernel {
                attrs.usize_list("kernel", kernel)?;
            }
            if let Some(pads) = &task.pads {
                attrs.usize_list("pads", &[pads.top, pads.bottom, pads.left, pads.right])?;
            }
            if let Some(strides) = &task.strides {
                attrs.usize_list("strides", strides)?;
            }
        }
        Operation::Mvn(mvn) => {
            attrs.key("across_channels")?;
            write!(attrs.f, "{}", mvn.across_channels)?;
            attrs.key("eps")?;
            write!(attrs.f, "{:?}", mvn.eps)?;
            attrs.key("normalize_variance")?;
            write!(attrs.f, "{}", mvn.normalize_variance)?;
        }
        Operation::Dft(dft) => {
            if let Some(axes) = &dft.axes {
                attrs.usize_list("axes", axes)?;
            }
            if let Some(signal_size) = &dft.signal_size {
                attrs.key("signal_size")?;
                write!(attrs.f, "[")?;
                for (idx, size) in signal_size.iter().enumerate() {
                    if idx > 0 {
                        write!(attrs.f, ", ")?;
                    }
                    write!(attrs.f, "{size}")?;
                }
                write!(attrs.f, "]")?;
            }
        }
        Operation::TopK(topk) => {
            attrs.key("axis")?;
            write!(attrs.f, "{}", topk.axis)?;
            attrs.key("k")?;
            write!(attrs.f, "{}", topk.k)?;
        }
        Operation::Interpolate(interp) => {
            attrs.usize_list("axes", &interp.axes)?;
            attrs.usize_list("pads_begin", &interp.pads_begin)?;
            attrs.usize_list("pads_end", &interp.pads_end)?;
            attrs.usize_list("scales", &interp.scales)?;
        }
        _ => {}
    }
    attrs.finish()?;

    if let Some(result_ty) = op.result_type() {
        if op.output_buff().is_none() {
            write!(f, " -> {result_ty}")?;
        }
    }
    Ok(())
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write_op(f, 0, self)
    }
}

impl Display for ClusterTilingOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let write_group = |f: &mut Formatter<'_>,
                           keyword: &str,
                           operands: &[Value],
                           args: &[Value]|
         -> FmtResult {
            write!(f, "{keyword}(")?;
            for (idx, (operand, arg)) in operands.iter().zip(args).enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                // The outer type is printed; the block argument's compact
                // type is re-derived when parsing, the same way `build` does.
                write!(f, "{operand} as {arg}: {}", operand.ty)?;
            }
            write!(f, ")")
        };

        write!(f, "npucl.cluster_tiling ")?;
        write_group(f, "inputs", self.inputs(), self.inner_inputs())?;
        write!(f, " ")?;
        write_group(f, "outputs", self.output_buffs(), self.inner_outputs())?;

        write!(f, " -> ")?;
        for (idx, result_ty) in self.result_types().iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{result_ty}")?;
        }

        writeln!(f, " {{")?;
        for (index, op) in self.body().ops.iter().enumerate() {
            write!(f, "  ")?;
            write_op(f, index, op)?;
            writeln!(f)?;
        }
        write!(f, "}}")
    }
}

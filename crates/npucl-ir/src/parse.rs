//! Reparsing of the printed cluster-tiling form.
//!
//! Hand-written cursor over the source text; the grammar is small and fixed,
//! so no parsing dependencies are pulled in. The parse is lossless: feeding
//! back the output of the printer reconstructs an identical operation,
//! including the positional operand/block-argument mapping and the derived
//! input/output counts.

use std::collections::HashMap;

use npucl_shape::{DimsOrder, Shape, Strides};

use crate::{
    Block, BufferType, ClusterTilingOp, DistributedAttr, DistributedBufferType, DistributionMode,
    ElemType, MemRefType, MemoryKind, Operation, OverlapParams, PadInfo, ParseError,
    SparseBufferType, Value, ValueKind,
    ops::{
        CeilOp, ComputeTaskKind, ComputeTaskOp, CopyOp, DftOp, DistributedCastOp, HSwishOp,
        InterpolateOp, LogOp, MvnOp, QuantizeCastOp, ReshapeOp, TopKOp, YieldOp,
    },
};

type Result<T> = core::result::Result<T, ParseError>;

/// One parsed `key = value` attribute.
#[derive(Debug, Clone, PartialEq)]
enum AttrValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    IntList(Vec<i64>),
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.pos, message)
    }

    fn rest(&self) -> &str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(c) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<()> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{c}'")))
        }
    }

    fn eat_str(&mut self, s: &str) -> bool {
        self.skip_ws();
        if self.rest().starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn expect_str(&mut self, s: &str) -> Result<()> {
        if self.eat_str(s) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{s}'")))
        }
    }

    fn ident(&mut self) -> Result<&'a str> {
        self.skip_ws();
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.bump();
        }
        if self.pos == start {
            return Err(self.error("expected identifier"));
        }
        Ok(&self.src[start..self.pos])
    }

    fn usize_lit(&mut self) -> Result<usize> {
        self.skip_ws();
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }
        self.src[start..self.pos]
            .parse()
            .map_err(|_| ParseError::new(start, "expected integer"))
    }

    fn i64_lit(&mut self) -> Result<i64> {
        self.skip_ws();
        let start = self.pos;
        if self.peek() == Some('-') {
            self.bump();
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }
        self.src[start..self.pos]
            .parse()
            .map_err(|_| ParseError::new(start, "expected integer"))
    }

    /// A number that may be a float; decided by what `f64`/`i64` accept.
    fn number(&mut self) -> Result<AttrValue> {
        self.skip_ws();
        let start = self.pos;
        while matches!(
            self.peek(),
            Some(c) if c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E')
        ) {
            self.bump();
        }
        let text = &self.src[start..self.pos];
        if let Ok(value) = text.parse::<i64>() {
            return Ok(AttrValue::Int(value));
        }
        text.parse::<f64>()
            .map(AttrValue::Float)
            .map_err(|_| ParseError::new(start, format!("malformed number '{text}'")))
    }

    fn int_list(&mut self) -> Result<Vec<i64>> {
        self.expect('[')?;
        let mut values = Vec::new();
        if !self.eat(']') {
            loop {
                values.push(self.i64_lit()?);
                if !self.eat(',') {
                    break;
                }
            }
            self.expect(']')?;
        }
        Ok(values)
    }

    /// `{key = value, ...}`; the surrounding braces are consumed here.
    fn attr_dict(&mut self) -> Result<Vec<(String, AttrValue)>> {
        self.expect('{')?;
        let mut attrs = Vec::new();
        if self.eat('}') {
            return Ok(attrs);
        }
        loop {
            let key = self.ident()?.to_string();
            self.expect('=')?;
            self.skip_ws();
            let value = match self.peek() {
                Some('[') => AttrValue::IntList(self.int_list()?),
                Some('"') => {
                    self.bump();
                    let start = self.pos;
                    while matches!(self.peek(), Some(c) if c != '"') {
                        self.bump();
                    }
                    let text = self.src[start..self.pos].to_string();
                    self.expect('"')?;
                    AttrValue::Str(text)
                }
                Some('t' | 'f') => {
                    let word = self.ident()?;
                    match word {
                        "true" => AttrValue::Bool(true),
                        "false" => AttrValue::Bool(false),
                        other => return Err(self.error(format!("unexpected word '{other}'"))),
                    }
                }
                _ => self.number()?,
            };
            attrs.push((key, value));
            if !self.eat(',') {
                break;
            }
        }
        self.expect('}')?;
        Ok(attrs)
    }

    //
    // Types
    //

    fn elem_type(&mut self) -> Result<ElemType> {
        if self.eat_str("!quant<") {
            let scale = match self.number()? {
                AttrValue::Float(value) => value,
                AttrValue::Int(value) => value as f64,
                _ => return Err(self.error("expected quantization scale")),
            };
            self.expect(',')?;
            let zero_point = self.i64_lit()?;
            self.expect('>')?;
            return Ok(ElemType::QuantU8 { scale, zero_point });
        }
        let name = self.ident()?;
        match name {
            "f32" => Ok(ElemType::F32),
            "f16" => Ok(ElemType::F16),
            "bf16" => Ok(ElemType::BF16),
            "i64" => Ok(ElemType::I64),
            "i32" => Ok(ElemType::I32),
            "i8" => Ok(ElemType::I8),
            "u8" => Ok(ElemType::U8),
            "i1" => Ok(ElemType::I1),
            other => Err(self.error(format!("unknown element type '{other}'"))),
        }
    }

    fn dims_order(&mut self) -> Result<DimsOrder> {
        self.expect('#')?;
        if self.eat_str("perm<") {
            let mut axes = Vec::new();
            loop {
                axes.push(self.usize_lit()?);
                if !self.eat(',') {
                    break;
                }
            }
            self.expect('>')?;
            return DimsOrder::from_permutation(&axes)
                .map_err(|err| self.error(format!("bad permutation: {err:?}")));
        }
        let name = self.ident()?;
        DimsOrder::from_name(name).ok_or_else(|| self.error(format!("unknown order '{name}'")))
    }

    fn memory_kind(&mut self) -> Result<MemoryKind> {
        self.expect('@')?;
        let name = self.ident()?;
        MemoryKind::from_name(name)
            .ok_or_else(|| self.error(format!("unknown memory space '{name}'")))
    }

    fn memref(&mut self) -> Result<MemRefType> {
        self.expect_str("memref<")?;
        let mut dims = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some(c) if c.is_ascii_digit() => {
                    dims.push(self.usize_lit()?);
                    self.expect('x')?;
                }
                _ => break,
            }
        }
        let elem = self.elem_type()?;
        self.expect(',')?;
        let order = self.dims_order()?;
        self.expect(',')?;
        let memory = self.memory_kind()?;

        let mut ty = MemRefType::new(Shape::from(dims), elem, order, memory);
        if self.eat(',') {
            self.expect_str("strides")?;
            self.expect('=')?;
            let strides = self.int_list()?;
            ty = ty.with_strides(Strides::from(strides.into_iter().map(|s| s as usize)));
        }
        self.expect('>')?;
        Ok(ty)
    }

    fn distributed(&mut self) -> Result<DistributedBufferType> {
        self.expect_str("!npucl.distributed<")?;
        let base = self.memref()?;
        self.expect(',')?;
        let attrs = self.attr_dict()?;
        self.expect('>')?;

        let mut mode = None;
        let mut num_clusters = None;
        let mut num_tiles = None;
        let mut alignment = None;
        let mut kernel = None;
        let mut strides = None;
        let mut pads = None;

        let as_usize_list = |values: &[i64]| values.iter().map(|&v| v as usize).collect::<Vec<_>>();
        for (key, value) in &attrs {
            match (key.as_str(), value) {
                ("mode", AttrValue::Str(name)) => {
                    mode = Some(DistributionMode::from_names(name).ok_or_else(|| {
                        ParseError::new(self.pos, format!("unknown distribution mode '{name}'"))
                    })?);
                }
                ("num_clusters", AttrValue::Int(value)) => num_clusters = Some(*value as usize),
                ("num_tiles", AttrValue::IntList(values)) => num_tiles = Some(as_usize_list(values)),
                ("alignment", AttrValue::IntList(values)) => {
                    alignment = Some(as_usize_list(values))
                }
                ("kernel", AttrValue::IntList(values)) if values.len() == 2 => {
                    kernel = Some([values[0] as usize, values[1] as usize])
                }
                ("strides", AttrValue::IntList(values)) if values.len() == 2 => {
                    strides = Some([values[0] as usize, values[1] as usize])
                }
                ("pads", AttrValue::IntList(values)) if values.len() == 4 => {
                    pads = Some(PadInfo::new(
                        values[0] as usize,
                        values[1] as usize,
                        values[2] as usize,
                        values[3] as usize,
                    ))
                }
                (key, _) => {
                    return Err(self.error(format!("unexpected distribution attribute '{key}'")));
                }
            }
        }

        let mode = mode.ok_or_else(|| self.error("distribution without mode"))?;
        let num_clusters = num_clusters.ok_or_else(|| self.error("distribution without num_clusters"))?;
        let mut attr = DistributedAttr::new(mode, num_tiles, num_clusters);
        if let Some(alignment) = alignment {
            attr = attr.with_alignment(alignment);
        }
        if let (Some(kernel), Some(strides), Some(pads)) = (kernel, strides, pads) {
            attr = attr.with_overlap(OverlapParams {
                kernel,
                strides,
                pads,
            });
        }
        Ok(DistributedBufferType::new(base, attr))
    }

    fn sparse(&mut self) -> Result<SparseBufferType> {
        self.expect_str("!npucl.sparse<")?;
        self.expect_str("data")?;
        self.expect('=')?;
        let data = self.buffer_type()?;
        let mut sparsity_map = None;
        let mut storage_element_table = None;
        while self.eat(',') {
            let key = self.ident()?;
            self.expect('=')?;
            match key {
                "sparsity_map" => sparsity_map = Some(self.buffer_type()?),
                "storage_element_table" => storage_element_table = Some(self.buffer_type()?),
                other => return Err(self.error(format!("unexpected sparse part '{other}'"))),
            }
        }
        self.expect('>')?;
        Ok(SparseBufferType::new(data, sparsity_map, storage_element_table))
    }

    fn buffer_type(&mut self) -> Result<BufferType> {
        self.skip_ws();
        if self.rest().starts_with("memref<") {
            return Ok(BufferType::MemRef(self.memref()?));
        }
        if self.rest().starts_with("!npucl.distributed<") {
            return Ok(BufferType::Distributed(self.distributed()?));
        }
        if self.rest().starts_with("!npucl.sparse<") {
            return Ok(BufferType::Sparse(self.sparse()?));
        }
        Err(self.error("expected a buffer type"))
    }

    //
    // Values and operations
    //

    /// `%N`, `%argN` or `%tN`, without type resolution.
    fn value_name(&mut self) -> Result<ValueKind> {
        self.expect('%')?;
        if self.eat_str("arg") {
            return Ok(ValueKind::BlockArg(self.usize_lit()? as u32));
        }
        if self.rest().starts_with('t') {
            self.bump();
            return Ok(ValueKind::Local(self.usize_lit()? as u32));
        }
        Ok(ValueKind::Operand(self.usize_lit()? as u32))
    }

    fn value_use(&mut self, scope: &HashMap<ValueKind, Value>) -> Result<Value> {
        let kind = self.value_name()?;
        scope
            .get(&kind)
            .cloned()
            .ok_or_else(|| self.error(format!("use of undefined value {kind:?}")))
    }

    /// `(%a, %b, ...)` resolved against `scope`.
    fn value_list(&mut self, scope: &HashMap<ValueKind, Value>) -> Result<Vec<Value>> {
        self.expect('(')?;
        let mut values = Vec::new();
        if self.eat(')') {
            return Ok(values);
        }
        loop {
            values.push(self.value_use(scope)?);
            if !self.eat(',') {
                break;
            }
        }
        self.expect(')')?;
        Ok(values)
    }

    fn outputs_clause(&mut self, scope: &HashMap<ValueKind, Value>) -> Result<Value> {
        self.expect_str("outputs")?;
        self.expect('(')?;
        let buff = self.value_use(scope)?;
        self.expect(')')?;
        Ok(buff)
    }

    fn optional_attrs(&mut self) -> Result<Vec<(String, AttrValue)>> {
        self.skip_ws();
        if self.rest().starts_with('{') {
            self.attr_dict()
        } else {
            Ok(Vec::new())
        }
    }

    fn operation(&mut self, scope: &HashMap<ValueKind, Value>, index: usize) -> Result<Operation> {
        // Optional result binding; the printed name must match the position.
        self.skip_ws();
        let has_result = self.rest().starts_with("%t");
        if has_result {
            let ValueKind::Local(id) = self.value_name()? else {
                return Err(self.error("result binding must be a local value"));
            };
            if id as usize != index {
                return Err(self.error(format!(
                    "result %t{id} does not match operation index {index}"
                )));
            }
            self.expect('=')?;
        }

        self.expect_str("npucl.")?;
        let name = self.ident()?;

        let op = match name {
            "yield" => {
                let mut operands = Vec::new();
                loop {
                    operands.push(self.value_use(scope)?);
                    if !self.eat(',') {
                        break;
                    }
                }
                Operation::Yield(YieldOp { operands })
            }
            "compute_task" => {
                let kind_name = self.ident()?;
                let task = ComputeTaskKind::from_name(kind_name)
                    .ok_or_else(|| self.error(format!("unknown task kind '{kind_name}'")))?;
                let inputs = self.value_list(scope)?;
                let output_buff = self.outputs_clause(scope)?;
                let attrs = self.optional_attrs()?;

                let (input, weights) = match inputs.len() {
                    1 => (inputs[0].clone(), None),
                    2 => (inputs[0].clone(), Some(inputs[1].clone())),
                    n => return Err(self.error(format!("compute_task takes 1-2 inputs, got {n}"))),
                };
                let mut op = ComputeTaskOp {
                    task,
                    input,
                    weights,
                    output_buff,
                    kernel: None,
                    strides: None,
                    pads: None,
                };
                for (key, value) in attrs {
                    match (key.as_str(), value) {
                        ("kernel", AttrValue::IntList(v)) if v.len() == 2 => {
                            op.kernel = Some([v[0] as usize, v[1] as usize])
                        }
                        ("strides", AttrValue::IntList(v)) if v.len() == 2 => {
                            op.strides = Some([v[0] as usize, v[1] as usize])
                        }
                        ("pads", AttrValue::IntList(v)) if v.len() == 4 => {
                            op.pads = Some(PadInfo::new(
                                v[0] as usize,
                                v[1] as usize,
                                v[2] as usize,
                                v[3] as usize,
                            ))
                        }
                        (key, _) => {
                            return Err(
                                self.error(format!("unexpected compute_task attribute '{key}'"))
                            );
                        }
                    }
                }
                Operation::ComputeTask(op)
            }
            "copy" | "ceil" | "log" | "hswish" => {
                let inputs = self.value_list(scope)?;
                let output_buff = self.outputs_clause(scope)?;
                let [input] = inputs.as_slice() else {
                    return Err(self.error(format!("{name} takes exactly one input")));
                };
                let input = input.clone();
                match name {
                    "copy" => Operation::Copy(CopyOp { input, output_buff }),
                    "ceil" => Operation::Ceil(CeilOp { input, output_buff }),
                    "log" => Operation::Log(LogOp { input, output_buff }),
                    _ => Operation::HSwish(HSwishOp { input, output_buff }),
                }
            }
            "mvn" => {
                let inputs = self.value_list(scope)?;
                let output_buff = self.outputs_clause(scope)?;
                let [input] = inputs.as_slice() else {
                    return Err(self.error("mvn takes exactly one input"));
                };
                let mut op = MvnOp {
                    input: input.clone(),
                    output_buff,
                    across_channels: false,
                    normalize_variance: false,
                    eps: 0.0,
                };
                for (key, value) in self.optional_attrs()? {
                    match (key.as_str(), value) {
                        ("across_channels", AttrValue::Bool(v)) => op.across_channels = v,
                        ("normalize_variance", AttrValue::Bool(v)) => op.normalize_variance = v,
                        ("eps", AttrValue::Float(v)) => op.eps = v,
                        ("eps", AttrValue::Int(v)) => op.eps = v as f64,
                        (key, _) => {
                            return Err(self.error(format!("unexpected mvn attribute '{key}'")));
                        }
                    }
                }
                Operation::Mvn(op)
            }
            "dft" => {
                let inputs = self.value_list(scope)?;
                let output_buff = self.outputs_clause(scope)?;
                let [input] = inputs.as_slice() else {
                    return Err(self.error("dft takes exactly one input"));
                };
                let mut op = DftOp {
                    input: input.clone(),
                    output_buff,
                    axes: None,
                    signal_size: None,
                };
                for (key, value) in self.optional_attrs()? {
                    match (key.as_str(), value) {
                        ("axes", AttrValue::IntList(v)) => {
                            op.axes = Some(v.into_iter().map(|a| a as usize).collect())
                        }
                        ("signal_size", AttrValue::IntList(v)) => op.signal_size = Some(v),
                        (key, _) => {
                            return Err(self.error(format!("unexpected dft attribute '{key}'")));
                        }
                    }
                }
                Operation::Dft(op)
            }
            "topk" => {
                let inputs = self.value_list(scope)?;
                let output_buff = self.outputs_clause(scope)?;
                let [input] = inputs.as_slice() else {
                    return Err(self.error("topk takes exactly one input"));
                };
                let mut axis = None;
                let mut k = None;
                for (key, value) in self.optional_attrs()? {
                    match (key.as_str(), value) {
                        ("axis", AttrValue::Int(v)) => axis = Some(v as usize),
                        ("k", AttrValue::Int(v)) => k = Some(v as usize),
                        (key, _) => {
                            return Err(self.error(format!("unexpected topk attribute '{key}'")));
                        }
                    }
                }
                Operation::TopK(TopKOp {
                    input: input.clone(),
                    output_buff,
                    axis: axis.ok_or_else(|| self.error("topk without axis"))?,
                    k: k.ok_or_else(|| self.error("topk without k"))?,
                })
            }
            "interpolate" => {
                let inputs = self.value_list(scope)?;
                let output_buff = self.outputs_clause(scope)?;
                let [input] = inputs.as_slice() else {
                    return Err(self.error("interpolate takes exactly one input"));
                };
                let mut op = InterpolateOp {
                    input: input.clone(),
                    output_buff,
                    axes: Vec::new(),
                    scales: Vec::new(),
                    pads_begin: Vec::new(),
                    pads_end: Vec::new(),
                };
                let as_usize = |v: Vec<i64>| v.into_iter().map(|x| x as usize).collect();
                for (key, value) in self.optional_attrs()? {
                    match (key.as_str(), value) {
                        ("axes", AttrValue::IntList(v)) => op.axes = as_usize(v),
                        ("scales", AttrValue::IntList(v)) => op.scales = as_usize(v),
                        ("pads_begin", AttrValue::IntList(v)) => op.pads_begin = as_usize(v),
                        ("pads_end", AttrValue::IntList(v)) => op.pads_end = as_usize(v),
                        (key, _) => {
                            return Err(
                                self.error(format!("unexpected interpolate attribute '{key}'"))
                            );
                        }
                    }
                }
                Operation::Interpolate(op)
            }
            "reshape" | "quantize_cast" | "distributed_cast" => {
                let inputs = self.value_list(scope)?;
                let [input] = inputs.as_slice() else {
                    return Err(self.error(format!("{name} takes exactly one input")));
                };
                let input = input.clone();
                self.expect_str("->")?;
                let result_ty = self.buffer_type()?;
                match name {
                    "reshape" => Operation::Reshape(ReshapeOp { input, result_ty }),
                    "quantize_cast" => {
                        Operation::QuantizeCast(QuantizeCastOp { input, result_ty })
                    }
                    _ => Operation::DistributedCast(DistributedCastOp { input, result_ty }),
                }
            }
            other => return Err(self.error(format!("unknown operation 'npucl.{other}'"))),
        };

        if has_result != op.result_type().is_some() {
            return Err(self.error(format!(
                "operation npucl.{} result binding mismatch",
                op.name()
            )));
        }
        Ok(op)
    }

    /// `keyword(%N as %argM: type, ...)`; returns the outer operands and the
    /// compact-typed block arguments.
    fn operand_group(&mut self, keyword: &str, first_arg: usize) -> Result<(Vec<Value>, Vec<Value>)> {
        self.expect_str(keyword)?;
        self.expect('(')?;
        let mut operands = Vec::new();
        let mut args = Vec::new();
        if self.eat(')') {
            return Ok((operands, args));
        }
        loop {
            let operand_kind = self.value_name()?;
            let ValueKind::Operand(_) = operand_kind else {
                return Err(self.error("outer operand expected before 'as'"));
            };
            self.expect_str("as")?;
            let arg_kind = self.value_name()?;
            let ValueKind::BlockArg(arg_id) = arg_kind else {
                return Err(self.error("block argument expected after 'as'"));
            };
            let expected = (first_arg + args.len()) as u32;
            if arg_id != expected {
                return Err(self.error(format!(
                    "block argument %arg{arg_id} out of order, expected %arg{expected}"
                )));
            }
            self.expect(':')?;
            let ty = self.buffer_type()?;

            // Same derivation as the builder: block arguments take the
            // compact form of the outer operand type.
            args.push(Value::new(arg_kind, ty.compact_type()));
            operands.push(Value {
                kind: operand_kind,
                ty,
            });
            if !self.eat(',') {
                break;
            }
        }
        self.expect(')')?;
        Ok((operands, args))
    }

    fn cluster_tiling(&mut self) -> Result<ClusterTilingOp> {
        self.expect_str("npucl.cluster_tiling")?;
        let (inputs, input_args) = self.operand_group("inputs", 0)?;
        let (outputs, output_args) = self.operand_group("outputs", input_args.len())?;
        let input_count = inputs.len();

        self.expect_str("->")?;
        let mut result_types = Vec::new();
        loop {
            result_types.push(self.buffer_type()?);
            if !self.eat(',') {
                break;
            }
        }

        let mut body = Block::default();
        body.args.extend(input_args);
        body.args.extend(output_args);

        let mut scope: HashMap<ValueKind, Value> = HashMap::new();
        for arg in &body.args {
            scope.insert(arg.kind, arg.clone());
        }

        self.expect('{')?;
        loop {
            self.skip_ws();
            if self.eat('}') {
                break;
            }
            let index = body.ops.len();
            let op = self.operation(&scope, index)?;
            if let Some(result_ty) = op.result_type() {
                let kind = ValueKind::Local(index as u32);
                scope.insert(kind, Value::new(kind, result_ty));
            }
            body.ops.push(op);
        }

        self.skip_ws();
        if !self.rest().is_empty() {
            return Err(self.error("trailing input after operation"));
        }

        let mut operands = inputs;
        operands.extend(outputs);
        Ok(ClusterTilingOp::from_parsed(
            operands,
            input_count,
            result_types,
            body,
        ))
    }
}

impl ClusterTilingOp {
    /// Parses the textual form produced by the `Display` implementation.
    pub fn parse(src: &str) -> Result<ClusterTilingOp> {
        Parser::new(src).cluster_tiling()
    }
}

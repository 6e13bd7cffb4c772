//! The lowering driver (§4.5): walks a [`tangle_ssa::GeneratedFunction`]'s
//! flattened, liveness-annotated step list and drives a
//! [`tangle_circuit::CircuitBuilder`] to build the final gate-level circuit.
//!
//! Grounded on the teacher's `analysis::builder` pattern of a single driving
//! struct owning the allocator plus a value-keyed lookup table, generalized
//! here from "AST node to wire" to "SSA `ValueId` to [`WireBundle`]".

use ahash::AHashMap;
use tangle_circuit::alloc::WireBundle;
use tangle_circuit::coords::WireId;
use tangle_circuit::gate::GateOp;
use tangle_circuit::{arith, CircuitBuilder};
use tangle_diag::CompileError;
use tangle_ssa::{CompilerOptions, GeneratedFunction, Instruction, Opcode, Value, ValueId};

/// Drives one [`GeneratedFunction`] through a fresh [`CircuitBuilder`],
/// producing the final emitted [`tangle_circuit::emit::Circuit`].
pub fn lower_to_circuit(
    generated: &GeneratedFunction,
    options: CompilerOptions,
) -> Result<tangle_circuit::emit::Circuit, CompileError> {
    let mut driver = Driver::new(generated, options);
    driver.run()?;
    Ok(driver.builder.finish())
}

struct Driver<'a> {
    generated: &'a GeneratedFunction,
    options: CompilerOptions,
    builder: CircuitBuilder,
    bundles: AHashMap<u32, WireBundle>,
}

impl<'a> Driver<'a> {
    fn new(generated: &'a GeneratedFunction, options: CompilerOptions) -> Self {
        Self { generated, options, builder: CircuitBuilder::new(), bundles: AHashMap::new() }
    }

    fn value(&self, id: ValueId) -> &Value {
        &self.generated.values[id.0 as usize]
    }

    fn bind(&mut self, id: ValueId, bundle: WireBundle) {
        self.bundles.insert(id.0, bundle);
    }

    fn run(&mut self) -> Result<(), CompileError> {
        for (name, id) in &self.generated.inputs {
            let bits = self.value(*id).ty.bits as usize;
            let bundle = self.builder.declare_input(name.clone(), bits);
            self.bind(*id, bundle);
        }

        for inst in &self.generated.steps {
            self.lower_instruction(inst)?;
        }

        for (i, &id) in self.generated.outputs.iter().enumerate() {
            let bundle = self.bundle_for(id)?;
            self.builder.declare_output(format!("out{i}"), &bundle);
        }
        Ok(())
    }

    /// Returns the wire bundle for `id`, materializing a constant's literal
    /// bits on first reference if the generator never emitted an
    /// instruction producing it (§4.4.5: constants fold away, the driver is
    /// where their bits finally become real wires).
    fn bundle_for(&mut self, id: ValueId) -> Result<WireBundle, CompileError> {
        if let Some(bundle) = self.bundles.get(&id.0) {
            return Ok(bundle.clone());
        }
        let value = self.value(id).clone();
        let konst = value.konst.clone().unwrap_or_else(|| {
            panic!("lowering driver: value {id:?} has neither a producing instruction nor a constant payload")
        });
        let wires = self.embed_const(&konst)?;
        let bundle = WireBundle::new(wires);
        self.bind(id, bundle.clone());
        Ok(bundle)
    }

    fn embed_const(&mut self, payload: &tangle_ssa::ConstPayload) -> Result<Vec<WireId>, CompileError> {
        use tangle_ssa::ConstPayload::*;
        Ok(match payload {
            Bool(b) => vec![self.const_bit(*b)],
            Int(i) => (0..i.width()).map(|bit| self.const_bit(i.bit(bit))).collect(),
            Str(s) => s.bytes().flat_map(|byte| (0..8).map(move |bit| (byte >> bit) & 1 == 1)).map(|b| self.const_bit(b)).collect(),
            Array(elems) => {
                let mut wires = Vec::new();
                for elem in elems {
                    wires.extend(self.embed_const(elem)?);
                }
                wires
            }
            Type(_) => Vec::new(),
        })
    }

    fn const_bit(&mut self, b: bool) -> WireId {
        let (alloc, special) = self.builder.alloc_and_special();
        if b { special.one(alloc) } else { special.zero(alloc) }
    }

    fn not_bundle(&mut self, a: &[WireId]) -> Vec<WireId> {
        let (alloc, _) = self.builder.alloc_and_special();
        a.iter().map(|&w| {
            let o = alloc.wire();
            alloc.inv_gate(w, o);
            o
        }).collect()
    }

    fn lower_instruction(&mut self, inst: &Instruction) -> Result<(), CompileError> {
        if inst.op.is_float() {
            return Err(CompileError::semantic(inst.loc, format!("{} has no circuit lowering", inst.op.name())));
        }

        match inst.op {
            Opcode::If | Opcode::Jump => {
                unreachable!("lowering driver: {} is declared but never emitted by the generator", inst.op.name())
            }
            Opcode::Phi => {
                // A phi's operands and result were already unified by the
                // generator's lazy Select materialization; by the time a
                // `phi` step reaches the driver it is a plain mux over two
                // already-bound bundles.
                self.lower_phi(inst)?;
            }
            Opcode::Ret | Opcode::Gc => {
                // Bookkeeping only: `ret` marks the function boundary (the
                // driver reads `generated.outputs` directly instead), `gc`
                // is a liveness hint with no circuit counterpart.
            }
            Opcode::Circ => self.lower_circ(inst)?,
            Opcode::Builtin => self.lower_builtin(inst)?,
            Opcode::Mov => self.lower_mov(inst)?,
            Opcode::Amov => self.lower_amov(inst)?,
            Opcode::Slice => self.lower_slice(inst)?,
            Opcode::Lshift | Opcode::Rshift => self.lower_shift(inst)?,
            Opcode::Bts | Opcode::Btc => self.lower_bit_toggle(inst)?,
            _ => self.lower_arith(inst)?,
        }
        Ok(())
    }

    fn output_of(&self, inst: &Instruction) -> ValueId {
        inst.output.unwrap_or_else(|| panic!("lowering driver: {} produced no output value", inst.op.name()))
    }

    fn lower_phi(&mut self, inst: &Instruction) -> Result<(), CompileError> {
        let [cond, t, f] = *inst.inputs.as_slice() else {
            panic!("lowering driver: phi expects exactly 3 inputs, got {}", inst.inputs.len());
        };
        let cond_bundle = self.bundle_for(cond)?;
        let sel = cond_bundle.get(0).expect("lowering driver: phi condition is not a single wire");
        let t_bundle = self.bundle_for(t)?;
        let f_bundle = self.bundle_for(f)?;
        let (alloc, special) = self.builder.alloc_and_special();
        let out = arith::mux(alloc, special, sel, t_bundle.as_slice(), f_bundle.as_slice());
        self.bind(self.output_of(inst), WireBundle::new(out));
        Ok(())
    }

    fn lower_circ(&mut self, inst: &Instruction) -> Result<(), CompileError> {
        let circuit = inst.circ.as_ref().expect("lowering driver: circ instruction missing its embedded circuit");
        let mut local: Vec<Option<WireId>> = vec![None; circuit.wire_count as usize];

        for (port, &arg_id) in circuit.inputs.iter().zip(inst.inputs.iter()) {
            let bundle = self.bundle_for(arg_id)?;
            for (i, &dense_id) in port.wire_ids.iter().enumerate() {
                let w = bundle.get(i).unwrap_or_else(|| self.const_bit(false));
                local[dense_id as usize] = Some(w);
            }
        }

        for gate in &circuit.gates {
            let read = |local: &[Option<WireId>], id: u32| {
                local[id as usize].unwrap_or_else(|| panic!("lowering driver: embedded circuit wire {id} read before driven"))
            };
            let a = read(&local, gate.input1);
            let out = self.builder.alloc().wire();
            match gate.op {
                GateOp::Inv => {
                    self.builder.alloc().inv_gate(a, out);
                }
                op => {
                    let b = read(&local, gate.input2.expect("lowering driver: binary gate missing second input"));
                    self.builder.alloc().binary_gate(op, a, b, out);
                }
            }
            local[gate.output as usize] = Some(out);
        }

        let mut all_outs = Vec::with_capacity(circuit.outputs.len());
        for port in &circuit.outputs {
            let wires: Vec<WireId> = port.wire_ids.iter().map(|&id| local[id as usize].expect("lowering driver: embedded circuit output never driven")).collect();
            all_outs.push(WireBundle::new(wires));
        }

        let mut dests = Vec::with_capacity(1 + inst.extra_outputs.len());
        if let Some(primary) = inst.output {
            dests.push(primary);
        }
        dests.extend(inst.extra_outputs.iter().copied());
        for (dest, bundle) in dests.into_iter().zip(all_outs.into_iter()) {
            self.bind(dest, bundle);
        }
        Ok(())
    }

    fn lower_builtin(&mut self, inst: &Instruction) -> Result<(), CompileError> {
        let name = inst.builtin_name.as_deref().unwrap_or_else(|| panic!("lowering driver: builtin instruction missing its name"));
        match name {
            "hamming" => {
                let [a, b] = *inst.inputs.as_slice() else {
                    panic!("lowering driver: hamming expects exactly 2 inputs");
                };
                let a = self.bundle_for(a)?;
                let b = self.bundle_for(b)?;
                let (alloc, special) = self.builder.alloc_and_special();
                let out = arith::hamming_distance(alloc, special, a.as_slice(), b.as_slice());
                self.bind(self.output_of(inst), WireBundle::new(out));
                Ok(())
            }
            other => Err(CompileError::semantic(inst.loc, format!("no circuit lowering registered for builtin {other:?}"))),
        }
    }

    fn lower_mov(&mut self, inst: &Instruction) -> Result<(), CompileError> {
        if let [dest_bits, sign_extend] = *inst.imm.as_slice() {
            // Width-changing numeric cast: truncate (pure rewiring) or
            // extend with zero/sign-bit copies (still no gates).
            let [src] = *inst.inputs.as_slice() else {
                panic!("lowering driver: width-changing mov expects exactly 1 input");
            };
            let src_bundle = self.bundle_for(src)?;
            let src_wires = src_bundle.as_slice();
            let dest_bits = dest_bits as usize;
            let out = if dest_bits <= src_wires.len() {
                src_wires[..dest_bits].to_vec()
            } else {
                let mut extended = src_wires.to_vec();
                let fill = if sign_extend != 0 {
                    *src_wires.last().expect("lowering driver: sign-extending an empty bundle")
                } else {
                    let (alloc, special) = self.builder.alloc_and_special();
                    special.zero(alloc)
                };
                extended.resize(dest_bits, fill);
                extended
            };
            self.bind(self.output_of(inst), WireBundle::new(out));
        } else {
            // Composite construction: concatenate every input bundle in
            // declared field/element order (pure rewiring).
            let mut out = Vec::new();
            for &input in &inst.inputs {
                out.extend(self.bundle_for(input)?.into_vec());
            }
            self.bind(self.output_of(inst), WireBundle::new(out));
        }
        Ok(())
    }

    fn lower_amov(&mut self, inst: &Instruction) -> Result<(), CompileError> {
        match (inst.inputs.as_slice(), inst.imm.as_slice()) {
            // Dynamic-index read: base array, runtime index, no imm.
            (&[base, index], []) => {
                let base_bundle = self.bundle_for(base)?;
                let index_bundle = self.bundle_for(index)?;
                let out_bits = self.value(self.output_of(inst)).ty.bits as usize;
                let elements: Vec<Vec<WireId>> = base_bundle.as_slice().chunks(out_bits.max(1)).map(<[WireId]>::to_vec).collect();
                let (alloc, special) = self.builder.alloc_and_special();
                let selected = arith::select_indexed(alloc, special, &elements, index_bundle.as_slice());
                self.bind(self.output_of(inst), WireBundle::new(selected));
            }
            // Static-offset field write: replace `[offset, offset+len)`.
            (&[base, new_elem], &[offset, len]) => {
                let base_bundle = self.bundle_for(base)?;
                let elem_bundle = self.bundle_for(new_elem)?;
                let mut out = base_bundle.into_vec();
                let (offset, len) = (offset as usize, len as usize);
                out[offset..offset + len].clone_from_slice(&elem_bundle.as_slice()[..len]);
                self.bind(self.output_of(inst), WireBundle::new(out));
            }
            // Dynamic-index write: replace the element selected by `index`.
            (&[base, index, new_elem], &[elem_bits]) => {
                let base_bundle = self.bundle_for(base)?;
                let index_bundle = self.bundle_for(index)?;
                let elem_bundle = self.bundle_for(new_elem)?;
                let elem_bits = elem_bits as usize;
                let base_wires = base_bundle.as_slice();
                let mut out = base_wires.to_vec();
                for (chunk_idx, chunk) in base_wires.chunks(elem_bits).enumerate() {
                    let chunk_id = self.const_bundle_matching(chunk_idx as u64, index_bundle.bits());
                    let (alloc, special) = self.builder.alloc_and_special();
                    let is_selected = arith::compare_eq(alloc, special, index_bundle.as_slice(), &chunk_id);
                    let (alloc, special) = self.builder.alloc_and_special();
                    let muxed = arith::mux(alloc, special, is_selected, elem_bundle.as_slice(), chunk);
                    out[chunk_idx * elem_bits..chunk_idx * elem_bits + chunk.len()].clone_from_slice(&muxed[..chunk.len()]);
                }
                self.bind(self.output_of(inst), WireBundle::new(out));
            }
            _ => panic!("lowering driver: amov with {} inputs and {} imm is not a recognized shape", inst.inputs.len(), inst.imm.len()),
        }
        Ok(())
    }

    fn const_bundle_matching(&mut self, value: u64, width: usize) -> Vec<WireId> {
        (0..width).map(|bit| self.const_bit((value >> bit) & 1 == 1)).collect()
    }

    fn lower_slice(&mut self, inst: &Instruction) -> Result<(), CompileError> {
        let [base] = *inst.inputs.as_slice() else {
            panic!("lowering driver: slice expects exactly 1 input");
        };
        let [start, len] = *inst.imm.as_slice() else {
            panic!("lowering driver: slice expects exactly 2 immediates");
        };
        let base_bundle = self.bundle_for(base)?;
        let out = arith::slice(base_bundle.as_slice(), start as usize, len as usize);
        self.bind(self.output_of(inst), WireBundle::new(out));
        Ok(())
    }

    fn lower_shift(&mut self, inst: &Instruction) -> Result<(), CompileError> {
        let [a] = *inst.inputs.as_slice() else {
            panic!("lowering driver: shift expects exactly 1 input");
        };
        let [amount] = *inst.imm.as_slice() else {
            panic!("lowering driver: shift expects exactly 1 immediate");
        };
        let bundle = self.bundle_for(a)?;
        let (alloc, special) = self.builder.alloc_and_special();
        let out = match inst.op {
            Opcode::Lshift => arith::shift_left_const(alloc, special, bundle.as_slice(), amount as usize),
            Opcode::Rshift => arith::shift_right_const(alloc, special, bundle.as_slice(), amount as usize),
            _ => unreachable!(),
        };
        self.bind(self.output_of(inst), WireBundle::new(out));
        Ok(())
    }

    fn lower_bit_toggle(&mut self, inst: &Instruction) -> Result<(), CompileError> {
        let [a] = *inst.inputs.as_slice() else {
            panic!("lowering driver: bit-toggle expects exactly 1 input");
        };
        let [idx] = *inst.imm.as_slice() else {
            panic!("lowering driver: bit-toggle expects exactly 1 immediate");
        };
        let bundle = self.bundle_for(a)?;
        let out = match inst.op {
            Opcode::Bts => {
                let (alloc, special) = self.builder.alloc_and_special();
                arith::bit_set(alloc, special, bundle.as_slice(), idx as usize)
            }
            Opcode::Btc => arith::bit_complement(self.builder.alloc(), bundle.as_slice(), idx as usize),
            _ => unreachable!(),
        };
        self.bind(self.output_of(inst), WireBundle::new(out));
        Ok(())
    }

    fn lower_arith(&mut self, inst: &Instruction) -> Result<(), CompileError> {
        let [lhs, rhs] = *inst.inputs.as_slice() else {
            panic!("lowering driver: {} expects exactly 2 inputs, got {}", inst.op.name(), inst.inputs.len());
        };
        let a = self.bundle_for(lhs)?;
        let b = self.bundle_for(rhs)?;

        // `Bclr` needs a whole-`self` call (`not_bundle`) before it can touch
        // the allocator, so it borrows `self.builder` fresh rather than
        // sharing the `alloc_and_special()` pair every other arm uses.
        let out: Vec<WireId> = if inst.op == Opcode::Bclr {
            let not_b = self.not_bundle(b.as_slice());
            let (alloc, special) = self.builder.alloc_and_special();
            arith::bitwise_and(alloc, special, a.as_slice(), &not_b)
        } else {
            let use_karatsuba = self.options.use_karatsuba;
            let (alloc, special) = self.builder.alloc_and_special();
            match inst.op {
                Opcode::Iadd | Opcode::Uadd => arith::ripple_add(alloc, special, a.as_slice(), b.as_slice()),
                Opcode::Isub | Opcode::Usub => arith::ripple_sub(alloc, special, a.as_slice(), b.as_slice()),
                Opcode::Imult | Opcode::Umult => {
                    if use_karatsuba {
                        arith::karatsuba_multiply(alloc, special, a.as_slice(), b.as_slice())
                    } else {
                        arith::array_multiply(alloc, special, a.as_slice(), b.as_slice())
                    }
                }
                Opcode::Idiv => arith::divide_signed(alloc, special, a.as_slice(), b.as_slice()).0,
                Opcode::Udiv => arith::divide_unsigned(alloc, special, a.as_slice(), b.as_slice()).0,
                Opcode::Imod => arith::divide_signed(alloc, special, a.as_slice(), b.as_slice()).1,
                Opcode::Umod => arith::divide_unsigned(alloc, special, a.as_slice(), b.as_slice()).1,
                Opcode::Bor => arith::bitwise_or(alloc, special, a.as_slice(), b.as_slice()),
                Opcode::Bxor => arith::bitwise_xor(alloc, special, a.as_slice(), b.as_slice()),
                Opcode::Band => arith::bitwise_and(alloc, special, a.as_slice(), b.as_slice()),
                Opcode::Ilt => vec![arith::compare_lt_signed(alloc, special, a.as_slice(), b.as_slice())],
                Opcode::Ult => vec![arith::compare_lt_unsigned(alloc, special, a.as_slice(), b.as_slice())],
                Opcode::Ile => vec![arith::compare_le_signed(alloc, special, a.as_slice(), b.as_slice())],
                Opcode::Ule => vec![arith::compare_le_unsigned(alloc, special, a.as_slice(), b.as_slice())],
                Opcode::Igt => vec![arith::compare_gt_signed(alloc, special, a.as_slice(), b.as_slice())],
                Opcode::Ugt => vec![arith::compare_gt_unsigned(alloc, special, a.as_slice(), b.as_slice())],
                Opcode::Ige => vec![arith::compare_ge_signed(alloc, special, a.as_slice(), b.as_slice())],
                Opcode::Uge => vec![arith::compare_ge_unsigned(alloc, special, a.as_slice(), b.as_slice())],
                Opcode::Eq => vec![arith::compare_eq(alloc, special, a.as_slice(), b.as_slice())],
                Opcode::Neq => vec![arith::compare_neq(alloc, special, a.as_slice(), b.as_slice())],
                Opcode::And => vec![arith::logical_and(alloc, a.get(0).expect("lowering driver: logical and on empty bundle"), b.get(0).expect("lowering driver: logical and on empty bundle"))],
                Opcode::Or => vec![arith::logical_or(alloc, a.get(0).expect("lowering driver: logical or on empty bundle"), b.get(0).expect("lowering driver: logical or on empty bundle"))],
                other => panic!("lowering driver: {} is not a 2-input arithmetic opcode", other.name()),
            }
        };
        self.bind(self.output_of(inst), WireBundle::new(out));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahash::AHashMap;
    use tangle_ast::{BinOp, Expr, Function, Package, Param, Program, Stmt};
    use tangle_diag::SourceLoc;
    use tangle_ssa::{compile_entry, Collaborators};
    use tangle_types::Info;

    fn loc() -> SourceLoc {
        SourceLoc::UNKNOWN
    }

    fn var(name: &str) -> Expr {
        Expr::Var { package: None, name: name.into(), loc: loc() }
    }

    fn adder_program() -> Program {
        let add = Function {
            name: "add".into(),
            params: vec![
                Param { name: "a".into(), ty: Info::unsigned(8) },
                Param { name: "b".into(), ty: Info::unsigned(8) },
            ],
            returns: vec![Info::unsigned(8)],
            body: vec![Stmt::Return {
                values: vec![Expr::Binary {
                    op: BinOp::Add,
                    lhs: Box::new(var("a")),
                    rhs: Box::new(var("b")),
                    loc: loc(),
                }],
                loc: loc(),
            }],
            loc: loc(),
        };
        let mut functions = AHashMap::new();
        functions.insert(add.name.clone(), add);
        let mut packages = AHashMap::new();
        packages.insert("main".to_string(), Package { bindings: vec![], functions, imports: vec![] });
        Program { packages, default_package: "main".into() }
    }

    #[test]
    fn adder_function_lowers_to_a_circuit_with_matching_ports() {
        let program = adder_program();
        let collaborators = Collaborators::for_testing();
        let options = CompilerOptions::default();
        let generated = compile_entry(&program, &collaborators, options, "main", "add").expect("compile_entry should succeed");

        let circuit = lower_to_circuit(&generated, options).expect("lowering should succeed");
        assert_eq!(circuit.inputs.len(), 2);
        assert_eq!(circuit.inputs[0].bits, 8);
        assert_eq!(circuit.outputs[0].bits, 8);
        assert!(circuit.stats.total() > 0);
    }
}

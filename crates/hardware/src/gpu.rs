//! GPU command-list processor.
//!
//! Owns the register file a command packet writes into, the vertex
//! attribute loader, and the draw-arrays/draw-elements primitive
//! assembler that feeds shaded vertices to [`crate::raster`].

use crate::bus::Bus;
use crate::common::constants::{GPU_ATTR_SLOTS, GPU_CMD_TABLE_SIZE, GPU_MASK_TABLE_SIZE};
use crate::raster::{CalcMode, ColbufFmt, CombSrc, CullMode, DepbufFmt, OperFunc, PrimMode, RasterState, TestFunc, TexFmt};
use crate::shader::{OutputMap, Shader, ShaderInput, SoftVertex, Uniforms, Vec4};

type CmdHandler = fn(&mut GpuCmd, &mut Bus, u32, u32);

/// Command-id register addresses.
///
/// These are an internal numbering this crate invented for its register
/// file; only the packet framing (header/payload layout) is fixed,
/// not the specific ids, which is a hardware detail no longer observable
/// once a command list is decoded.
mod cmd {
    pub const FACE_CULLING: u32 = 0x040;
    pub const VIEWPORT_SCALE_H: u32 = 0x041;
    pub const VIEWPORT_STEP_H: u32 = 0x042;
    pub const VIEWPORT_SCALE_V: u32 = 0x043;
    pub const VIEWPORT_STEP_V: u32 = 0x044;
    pub const VIEWPORT_SIGN_Y: u32 = 0x045;
    pub const BUF_DIM: u32 = 0x046;

    pub const COLBUF_ADDR: u32 = 0x050;
    pub const COLBUF_FORMAT: u32 = 0x051;
    pub const COLBUF_MASK: u32 = 0x052;
    pub const DEPBUF_ADDR: u32 = 0x058;
    pub const DEPBUF_FORMAT: u32 = 0x059;
    pub const DEPBUF_MASK: u32 = 0x05A;
    pub const DEPTH_FUNC: u32 = 0x05B;

    pub const TEX_SELECT: u32 = 0x080;
    pub const TEX_ADDR: u32 = 0x081;
    pub const TEX_DIM: u32 = 0x082;
    pub const TEX_FORMAT: u32 = 0x083;

    pub const COMB_SELECT: u32 = 0x0C0;
    pub const COMB_SRC: u32 = 0x0C1;
    pub const COMB_OPER: u32 = 0x0C2;
    pub const COMB_MODE: u32 = 0x0C3;
    pub const COMB_COLOR: u32 = 0x0C4;

    pub const ATTR_BASE: u32 = 0x200;
    pub const ATTR_SELECT: u32 = 0x201;
    pub const ATTR_OFFSET: u32 = 0x202;
    pub const ATTR_CONFIG: u32 = 0x203;
    pub const ATTR_FORMAT: u32 = 0x204;
    pub const ATTR_COUNT: u32 = 0x205;
    pub const VSH_ATTR_ID: u32 = 0x206;

    pub const FIXED_ATTR_IDX: u32 = 0x210;
    pub const FIXED_ATTR_DATA: u32 = 0x211;

    pub const PRIM_MODE: u32 = 0x220;
    pub const PRIM_RESTART: u32 = 0x221;
    pub const DRAW_ARRAYS_FIRST: u32 = 0x222;
    pub const DRAW_ARRAYS_COUNT: u32 = 0x223;
    pub const DRAW_ELEMENTS_ADDR: u32 = 0x224;
    pub const DRAW_ELEMENTS_FORMAT: u32 = 0x225;
    pub const DRAW_ELEMENTS_COUNT: u32 = 0x226;

    pub const VSH_OUT_SELECT: u32 = 0x230;
    pub const VSH_OUT_MAP: u32 = 0x231;

    pub const VSH_FLOAT_IDX: u32 = 0x240;
    pub const VSH_FLOAT_DATA: u32 = 0x241;
    pub const VSH_BOOL: u32 = 0x242;
    pub const VSH_INT_IDX: u32 = 0x243;
    pub const VSH_INT_DATA: u32 = 0x244;

    pub const VSH_CODE_IDX: u32 = 0x250;
    pub const VSH_CODE_DATA: u32 = 0x251;
    pub const VSH_DESC_IDX: u32 = 0x252;
    pub const VSH_DESC_DATA: u32 = 0x253;
    pub const VSH_ENTRY: u32 = 0x254;
    pub const VSH_END: u32 = 0x255;
}

/// One of the twelve vertex attribute loader slots: a byte offset plus a
/// nibble-packed component list.
#[derive(Clone, Copy, Default)]
struct AttrSlot {
    offset: u32,
    /// Up to 8 nibbles: values `0x0..=0xB` select a destination via
    /// `vsh_attr_ids`, values `0xC..=0xF` skip bytes.
    config: u32,
    /// One format nibble per `config` nibble: `(size_class:2 |
    /// count_minus_one:2)`.
    format: u32,
    count: u8,
}

fn component_byte_size(size_class: u32) -> u32 {
    match size_class {
        0 | 1 => 1,
        2 => 2,
        _ => 4,
    }
}

fn slot_stride(slot: &AttrSlot) -> u32 {
    let mut bytes = 0u32;
    for j in 0..u32::from(slot.count) {
        let nibble = (slot.config >> (j * 4)) & 0xF;
        if nibble <= 0xB {
            let fmt = (slot.format >> (j * 4)) & 0xF;
            let ncomp = ((fmt >> 2) & 0x3) + 1;
            bytes += component_byte_size(fmt & 0x3) * ncomp;
        } else {
            bytes = (bytes + 3) & !3;
            bytes += 4 * (nibble - 0xB);
        }
    }
    bytes
}

/// Reads one loader slot's worth of vertex data at `base` into `input`,
/// remapping each component group through `vsh_attr_ids`.
fn read_attr_slot(bus: &mut Bus, base: u32, slot: &AttrSlot, vsh_attr_ids: &[u8; GPU_ATTR_SLOTS], input: &mut ShaderInput) {
    let mut ptr = base;
    for j in 0..u32::from(slot.count) {
        let nibble = (slot.config >> (j * 4)) & 0xF;
        if nibble <= 0xB {
            let fmt = (slot.format >> (j * 4)) & 0xF;
            let size_class = fmt & 0x3;
            let ncomp = (((fmt >> 2) & 0x3) + 1) as usize;
            let mut value: Vec4 = [0.0, 0.0, 0.0, 1.0];
            for v in value.iter_mut().take(ncomp) {
                *v = match size_class {
                    0 => f32::from(bus.read_u8(ptr) as i8),
                    1 => f32::from(bus.read_u8(ptr)),
                    2 => f32::from(bus.read_u16(ptr) as i16),
                    _ => f32::from_bits(bus.read_u32(ptr)),
                };
                ptr += component_byte_size(size_class);
            }
            let dest = vsh_attr_ids[nibble as usize] as usize;
            input[dest.min(15)] = value;
        } else {
            ptr = (ptr + 3) & !3;
            ptr += 4 * (nibble - 0xB);
        }
    }
}

/// Decodes a word containing a 1-bit sign, 7-bit biased exponent, and
/// 16-bit mantissa ("float24") into an IEEE-754 `f32`.
fn flt24_to_f32(raw: u32) -> f32 {
    let sign = (raw >> 23) & 1;
    let exp = (raw >> 16) & 0x7F;
    let mantissa = raw & 0xFFFF;
    if exp == 0 && mantissa == 0 {
        return if sign == 1 { -0.0 } else { 0.0 };
    }
    let ieee_exp = exp + (127 - 63);
    f32::from_bits((sign << 31) | (ieee_exp << 23) | (mantissa << 7))
}

/// Decodes three packed 32-bit words into four float24 components
/// (fixed-attribute submission format).
fn decode_float24_triplet(words: [u32; 3]) -> Vec4 {
    let bits = (u128::from(words[0]) << 64) | (u128::from(words[1]) << 32) | u128::from(words[2]);
    std::array::from_fn(|i| {
        let shift = 96 - 24 * (i + 1);
        flt24_to_f32(((bits >> shift) & 0xFF_FFFF) as u32)
    })
}

fn expand_mask_table() -> [u32; GPU_MASK_TABLE_SIZE] {
    std::array::from_fn(|nibble| {
        let mut mask = 0u32;
        for lane in 0..4 {
            if nibble & (1 << lane) != 0 {
                mask |= 0xFFu32 << (lane * 8);
            }
        }
        mask
    })
}

/// GPU command-list processor state: register file, in-flight command
/// list cursor, and the vertex attribute loader configuration.
pub struct GpuCmd {
    cmd_addr: Option<u32>,
    cmd_end: u32,
    mask_table: [u32; GPU_MASK_TABLE_SIZE],

    attr_base: u32,
    attr_select: usize,
    attrs: [AttrSlot; GPU_ATTR_SLOTS],
    vsh_attr_ids: [u8; GPU_ATTR_SLOTS],

    fixed_select: usize,
    fixed_word_idx: u8,
    fixed_words: [u32; 3],
    fixed_raw: [[u32; 3]; GPU_ATTR_SLOTS],
    fixed_base: [Vec4; GPU_ATTR_SLOTS],
    fixed_dirty: bool,

    out_select: usize,
    out_map: OutputMap,

    float_select: usize,
    float_word_idx: u8,
    float_words: [u32; 3],
    int_select: usize,
    code_idx: usize,
    desc_idx: usize,

    shader: Shader,
    uniforms: Uniforms,

    raster: RasterState,
    comb_select: usize,
    tex_select: usize,

    prim_mode: PrimMode,
    first_index: u32,
    index_addr: u32,
    index_u16: bool,
    assembly: Vec<SoftVertex>,

    /// Running totals, copied into [`crate::stats::CoreStats`] by
    /// [`crate::sim::Core`] after each frame.
    pub vertices_shaded: u64,
    pub triangles_rasterized: u64,
    pub commands_processed: u64,
}

impl GpuCmd {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cmd_addr: None,
            cmd_end: 0,
            mask_table: expand_mask_table(),
            attr_base: 0,
            attr_select: 0,
            attrs: [AttrSlot::default(); GPU_ATTR_SLOTS],
            vsh_attr_ids: [0; GPU_ATTR_SLOTS],
            fixed_select: 0,
            fixed_word_idx: 0,
            fixed_words: [0; 3],
            fixed_raw: [[0; 3]; GPU_ATTR_SLOTS],
            fixed_base: [[0.0, 0.0, 0.0, 1.0]; GPU_ATTR_SLOTS],
            fixed_dirty: false,
            out_select: 0,
            out_map: [(0, 0); 0x18],
            float_select: 0,
            float_word_idx: 0,
            float_words: [0; 3],
            int_select: 0,
            code_idx: 0,
            desc_idx: 0,
            shader: Shader::new(),
            uniforms: Uniforms::default(),
            raster: RasterState::default(),
            comb_select: 0,
            tex_select: 0,
            prim_mode: PrimMode::Triangles,
            first_index: 0,
            index_addr: 0,
            index_u16: false,
            assembly: Vec::with_capacity(4),
            vertices_shaded: 0,
            triangles_rasterized: 0,
            commands_processed: 0,
        }
    }

    /// Whether a command list is currently being drained.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.cmd_addr.is_some()
    }

    /// Arms a command list to run from `base` for `size` bytes.
    pub fn start_list(&mut self, base: u32, size: u32) {
        self.cmd_addr = Some(base);
        self.cmd_end = base.wrapping_add(size);
    }

    /// Processes exactly one header/payload packet — one command-list
    /// "step" the scheduler drains via `TaskId::GpuCommandStep`. Returns
    /// whether the list has more work pending.
    pub fn run_one_packet(&mut self, bus: &mut Bus) -> bool {
        let Some(addr) = self.cmd_addr else { return false };

        let header = bus.read_u32(addr + 4);
        let count = (header >> 20) & 0xFF;
        let mask_idx = ((header >> 16) & 0xF) as usize;
        let inc = header & 0x8000_0000 != 0;
        let mut id = header & 0x3FF;
        let mask = self.mask_table[mask_idx];

        let mut payload = bus.read_u32(addr);
        self.dispatch(id, bus, payload, mask);
        self.commands_processed += 1;

        for j in 0..count {
            payload = bus.read_u32(addr + 4 * (j + 2));
            if inc {
                id = (id + 1) % GPU_CMD_TABLE_SIZE as u32;
            }
            self.dispatch(id, bus, payload, mask);
            self.commands_processed += 1;
        }

        let advance = ((count + 3) << 2) & !0x7;
        let next = addr.wrapping_add(advance);
        self.cmd_addr = if next >= self.cmd_end { None } else { Some(next) };
        self.cmd_addr.is_some()
    }

    fn dispatch(&mut self, id: u32, bus: &mut Bus, payload: u32, mask: u32) {
        let table = command_table();
        let handler = table[(id as usize).min(GPU_CMD_TABLE_SIZE - 1)];
        handler(self, bus, payload, mask);
    }

    fn rebuild_fixed_cache(&mut self) {
        if self.fixed_dirty {
            for i in 0..GPU_ATTR_SLOTS {
                self.fixed_base[i] = decode_float24_triplet(self.fixed_raw[i]);
            }
            self.fixed_dirty = false;
        }
    }

    fn assemble_vertex(&self, bus: &mut Bus, index: u32) -> ShaderInput {
        let mut input: ShaderInput = [[0.0, 0.0, 0.0, 1.0]; 16];
        for i in 0..GPU_ATTR_SLOTS {
            let slot = self.attrs[i];
            if slot.count == 0 {
                input[i] = self.fixed_base[i];
                continue;
            }
            let stride = slot_stride(&slot);
            let addr = self.attr_base.wrapping_add(slot.offset).wrapping_add(index.wrapping_mul(stride));
            read_attr_slot(bus, addr, &slot, &self.vsh_attr_ids, &mut input);
        }
        input
    }

    fn shade_and_feed(&mut self, bus: &mut Bus, index: u32) {
        self.rebuild_fixed_cache();
        let input = self.assemble_vertex(bus, index);
        self.shader.run(&input, &self.uniforms);
        let vertex = self.shader.build_vertex(&self.out_map);
        self.vertices_shaded += 1;
        self.feed_vertex(bus, vertex);
    }

    /// Appends `v` to the in-flight primitive assembly and, once enough
    /// vertices have accumulated for the current primitive mode, clips
    /// and rasterizes a triangle (primitive assembly).
    fn feed_vertex(&mut self, bus: &mut Bus, v: SoftVertex) {
        self.assembly.push(v);
        let n = self.assembly.len();
        let triangle = match self.prim_mode {
            PrimMode::Triangles if n == 3 => {
                let t = (self.assembly[0], self.assembly[1], self.assembly[2]);
                self.assembly.clear();
                Some(t)
            }
            PrimMode::TriStrips if n >= 3 => Some(if n % 2 == 1 {
                (self.assembly[n - 3], self.assembly[n - 2], self.assembly[n - 1])
            } else {
                (self.assembly[n - 2], self.assembly[n - 3], self.assembly[n - 1])
            }),
            PrimMode::TriFans if n >= 3 => Some((self.assembly[0], self.assembly[n - 2], self.assembly[n - 1])),
            _ => None,
        };
        if let Some((a, b, c)) = triangle {
            crate::raster::clip_triangle(&self.raster, bus, a, b, c);
            self.triangles_rasterized += 1;
        }
    }

    fn draw_arrays(&mut self, bus: &mut Bus, count: u32) {
        for i in 0..count {
            self.shade_and_feed(bus, self.first_index + i);
        }
    }

    fn draw_elements(&mut self, bus: &mut Bus, count: u32) {
        for i in 0..count {
            let index = if self.index_u16 {
                u32::from(bus.read_u16(self.index_addr + i * 2))
            } else {
                u32::from(bus.read_u8(self.index_addr + i))
            };
            self.shade_and_feed(bus, index);
        }
    }
}

impl Default for GpuCmd {
    fn default() -> Self {
        Self::new()
    }
}

fn as_test_func(value: u32) -> TestFunc {
    match value & 0x7 {
        0 => TestFunc::Never,
        2 => TestFunc::Equal,
        3 => TestFunc::NotEqual,
        4 => TestFunc::Less,
        5 => TestFunc::LessEqual,
        6 => TestFunc::Greater,
        7 => TestFunc::GreaterEqual,
        _ => TestFunc::Always,
    }
}

fn as_tex_fmt(value: u32) -> TexFmt {
    match value {
        0 => TexFmt::Rgba8,
        1 => TexFmt::Rgb8,
        2 => TexFmt::Rgb5A1,
        3 => TexFmt::Rgb565,
        4 => TexFmt::Rgba4,
        5 => TexFmt::La8,
        6 => TexFmt::Rg8,
        7 => TexFmt::L8,
        8 => TexFmt::A8,
        9 => TexFmt::La4,
        10 => TexFmt::L4,
        11 => TexFmt::A4,
        12 => TexFmt::Etc1,
        13 => TexFmt::Etc1A4,
        _ => TexFmt::Unknown,
    }
}

fn as_colbuf_fmt(value: u32) -> ColbufFmt {
    match value {
        0 => ColbufFmt::Rgba8,
        1 => ColbufFmt::Rgb565,
        2 => ColbufFmt::Rgb5A1,
        3 => ColbufFmt::Rgba4,
        _ => ColbufFmt::Unknown,
    }
}

fn as_depbuf_fmt(value: u32) -> DepbufFmt {
    match value {
        0 => DepbufFmt::D16,
        1 => DepbufFmt::D24,
        2 => DepbufFmt::D24S8,
        _ => DepbufFmt::Unknown,
    }
}

fn as_calc_mode(value: u32) -> CalcMode {
    match value {
        0 => CalcMode::Replace,
        1 => CalcMode::Mul,
        2 => CalcMode::Add,
        3 => CalcMode::AddSigned,
        4 => CalcMode::Interpolate,
        5 => CalcMode::Sub,
        6 => CalcMode::Dot3,
        7 => CalcMode::Dot3Alpha,
        8 => CalcMode::MulAdd,
        9 => CalcMode::AddMul,
        _ => CalcMode::Unknown,
    }
}

fn as_comb_src(value: u32) -> CombSrc {
    match value {
        0 => CombSrc::Primary,
        1 => CombSrc::Tex0,
        2 => CombSrc::Tex1,
        3 => CombSrc::Tex2,
        4 => CombSrc::Constant,
        5 => CombSrc::Previous,
        _ => CombSrc::Unknown,
    }
}

fn as_oper_func(value: u32) -> OperFunc {
    match value & 0x3 {
        1 => OperFunc::OneMinusSrc,
        2 => OperFunc::SrcAlpha,
        3 => OperFunc::OneMinusSrcAlpha,
        _ => OperFunc::Src,
    }
}

fn unknown_cmd(_gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    tracing::warn!(payload, "unrecognized GPU command id");
}

fn write_face_culling(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    gpu.raster.cull_mode = match payload & 0x3 {
        1 => CullMode::Front,
        2 => CullMode::Back,
        _ => CullMode::None,
    };
}

fn write_viewport_scale_h(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    gpu.raster.view_scale_h = f32::from_bits(payload);
}
fn write_viewport_step_h(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    gpu.raster.view_step_h = f32::from_bits(payload);
}
fn write_viewport_scale_v(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    gpu.raster.view_scale_v = f32::from_bits(payload);
}
fn write_viewport_step_v(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    gpu.raster.view_step_v = f32::from_bits(payload);
}
fn write_viewport_sign_y(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    gpu.raster.sign_y = if payload != 0 { -1.0 } else { 1.0 };
}
fn write_buf_dim(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    gpu.raster.buf_width = payload as u16;
    gpu.raster.buf_height = (payload >> 16) as u16;
}

fn write_colbuf_addr(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    gpu.raster.colbuf_addr = payload;
}
fn write_colbuf_format(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    gpu.raster.colbuf_fmt = as_colbuf_fmt(payload);
}
fn write_colbuf_mask(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    gpu.raster.colbuf_mask = payload as u8;
}
fn write_depbuf_addr(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    gpu.raster.depbuf_addr = payload;
}
fn write_depbuf_format(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    gpu.raster.depbuf_fmt = as_depbuf_fmt(payload);
}
fn write_depbuf_mask(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    gpu.raster.depbuf_mask = payload as u8;
}
fn write_depth_func(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    gpu.raster.depth_func = as_test_func(payload);
}

fn write_tex_select(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    gpu.raster_tex_select(payload);
}
fn write_tex_addr(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    let idx = gpu.tex_select();
    gpu.raster.textures[idx].addr = payload;
}
fn write_tex_dim(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    let idx = gpu.tex_select();
    gpu.raster.textures[idx].width = payload as u16;
    gpu.raster.textures[idx].height = (payload >> 16) as u16;
}
fn write_tex_format(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    let idx = gpu.tex_select();
    gpu.raster.textures[idx].format = as_tex_fmt(payload);
}

fn write_comb_select(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    gpu.comb_select = (payload as usize) % 6;
}
fn write_comb_src(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    let stage = gpu.comb_select;
    let src = &mut gpu.raster.combiners[stage].src;
    for (i, s) in src.iter_mut().enumerate() {
        *s = as_comb_src((payload >> (i * 3)) & 0x7);
    }
}
fn write_comb_oper(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    let stage = gpu.comb_select;
    let oper = &mut gpu.raster.combiners[stage].oper;
    for (i, o) in oper.iter_mut().enumerate() {
        *o = as_oper_func((payload >> (i * 2)) & 0x3);
    }
}
fn write_comb_mode(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    let stage = gpu.comb_select;
    gpu.raster.combiners[stage].rgb_mode = as_calc_mode(payload & 0xF);
    gpu.raster.combiners[stage].alpha_mode = as_calc_mode((payload >> 4) & 0xF);
}
fn write_comb_color(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    let stage = gpu.comb_select;
    let c = [payload, payload >> 8, payload >> 16, payload >> 24].map(|x| f32::from(x as u8) / 255.0);
    gpu.raster.combiners[stage].constant = c;
}

fn write_attr_base(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    gpu.attr_base = payload;
}
fn write_attr_select(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    gpu.attr_select = (payload as usize) % GPU_ATTR_SLOTS;
}
fn write_attr_offset(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    let i = gpu.attr_select;
    gpu.attrs[i].offset = payload;
}
fn write_attr_config(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    let i = gpu.attr_select;
    gpu.attrs[i].config = payload;
}
fn write_attr_format(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    let i = gpu.attr_select;
    gpu.attrs[i].format = payload;
}
fn write_attr_count(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    let i = gpu.attr_select;
    gpu.attrs[i].count = (payload & 0xF) as u8;
}
fn write_vsh_attr_id(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    let i = gpu.attr_select;
    gpu.vsh_attr_ids[i] = (payload & 0xF) as u8;
}

fn write_fixed_attr_idx(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    gpu.fixed_select = (payload as usize) % GPU_ATTR_SLOTS;
    gpu.fixed_word_idx = 0;
}
fn write_fixed_attr_data(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    gpu.fixed_words[gpu.fixed_word_idx as usize] = payload;
    gpu.fixed_word_idx += 1;
    if gpu.fixed_word_idx == 3 {
        gpu.fixed_raw[gpu.fixed_select] = gpu.fixed_words;
        gpu.fixed_dirty = true;
        gpu.fixed_word_idx = 0;
        gpu.fixed_select = (gpu.fixed_select + 1) % GPU_ATTR_SLOTS;
    }
}

fn write_prim_mode(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    gpu.prim_mode = match payload & 0x3 {
        1 => PrimMode::TriStrips,
        2 => PrimMode::TriFans,
        _ => PrimMode::Triangles,
    };
}
fn write_prim_restart(gpu: &mut GpuCmd, _bus: &mut Bus, _payload: u32, _mask: u32) {
    gpu.assembly.clear();
}
fn write_draw_arrays_first(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    gpu.first_index = payload;
}
fn write_draw_arrays_count(gpu: &mut GpuCmd, bus: &mut Bus, payload: u32, _mask: u32) {
    gpu.draw_arrays(bus, payload);
}
fn write_draw_elements_addr(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    gpu.index_addr = payload;
}
fn write_draw_elements_format(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    gpu.index_u16 = payload != 0;
}
fn write_draw_elements_count(gpu: &mut GpuCmd, bus: &mut Bus, payload: u32, _mask: u32) {
    gpu.draw_elements(bus, payload);
}

fn write_vsh_out_select(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    gpu.out_select = (payload as usize) % 0x18;
}
fn write_vsh_out_map(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    let i = gpu.out_select;
    gpu.out_map[i] = ((payload & 0x7) as u8, ((payload >> 3) & 0x3) as u8);
}

fn write_vsh_float_idx(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    gpu.float_select = (payload as usize) % 96;
    gpu.float_word_idx = 0;
}
fn write_vsh_float_data(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    gpu.float_words[gpu.float_word_idx as usize] = payload;
    gpu.float_word_idx += 1;
    if gpu.float_word_idx == 3 {
        gpu.uniforms.float[gpu.float_select] = decode_float24_triplet(gpu.float_words);
        gpu.float_word_idx = 0;
        gpu.float_select = (gpu.float_select + 1) % 96;
    }
}
fn write_vsh_bool(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    for (i, b) in gpu.uniforms.bool_.iter_mut().enumerate() {
        *b = payload & (1 << i) != 0;
    }
}
fn write_vsh_int_idx(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    gpu.int_select = (payload as usize) % 4;
}
fn write_vsh_int_data(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    let i = gpu.int_select;
    gpu.uniforms.int[i] = [payload as u8, (payload >> 8) as u8, (payload >> 16) as u8];
}

fn write_vsh_code_idx(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    gpu.code_idx = payload as usize;
}
fn write_vsh_code_data(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    let idx = gpu.code_idx % gpu.shader.code.len();
    gpu.shader.code[idx] = payload;
    gpu.code_idx += 1;
}
fn write_vsh_desc_idx(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    gpu.desc_idx = payload as usize;
}
fn write_vsh_desc_data(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    let idx = gpu.desc_idx % gpu.shader.opdesc.len();
    gpu.shader.opdesc[idx] = payload;
    gpu.desc_idx += 1;
}
fn write_vsh_entry(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    gpu.shader.entry = payload as u16;
}
fn write_vsh_end(gpu: &mut GpuCmd, _bus: &mut Bus, payload: u32, _mask: u32) {
    gpu.shader.end = payload as u16;
}

impl GpuCmd {
    fn raster_tex_select(&mut self, payload: u32) {
        self.tex_select = (payload as usize) % 3;
    }

    fn tex_select(&self) -> usize {
        self.tex_select
    }
}

type CmdTable = [CmdHandler; GPU_CMD_TABLE_SIZE];

fn command_table() -> &'static CmdTable {
    static TABLE: std::sync::OnceLock<CmdTable> = std::sync::OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table: CmdTable = [unknown_cmd as CmdHandler; GPU_CMD_TABLE_SIZE];
        let entries: &[(u32, CmdHandler)] = &[
            (cmd::FACE_CULLING, write_face_culling),
            (cmd::VIEWPORT_SCALE_H, write_viewport_scale_h),
            (cmd::VIEWPORT_STEP_H, write_viewport_step_h),
            (cmd::VIEWPORT_SCALE_V, write_viewport_scale_v),
            (cmd::VIEWPORT_STEP_V, write_viewport_step_v),
            (cmd::VIEWPORT_SIGN_Y, write_viewport_sign_y),
            (cmd::BUF_DIM, write_buf_dim),
            (cmd::COLBUF_ADDR, write_colbuf_addr),
            (cmd::COLBUF_FORMAT, write_colbuf_format),
            (cmd::COLBUF_MASK, write_colbuf_mask),
            (cmd::DEPBUF_ADDR, write_depbuf_addr),
            (cmd::DEPBUF_FORMAT, write_depbuf_format),
            (cmd::DEPBUF_MASK, write_depbuf_mask),
            (cmd::DEPTH_FUNC, write_depth_func),
            (cmd::TEX_SELECT, write_tex_select),
            (cmd::TEX_ADDR, write_tex_addr),
            (cmd::TEX_DIM, write_tex_dim),
            (cmd::TEX_FORMAT, write_tex_format),
            (cmd::COMB_SELECT, write_comb_select),
            (cmd::COMB_SRC, write_comb_src),
            (cmd::COMB_OPER, write_comb_oper),
            (cmd::COMB_MODE, write_comb_mode),
            (cmd::COMB_COLOR, write_comb_color),
            (cmd::ATTR_BASE, write_attr_base),
            (cmd::ATTR_SELECT, write_attr_select),
            (cmd::ATTR_OFFSET, write_attr_offset),
            (cmd::ATTR_CONFIG, write_attr_config),
            (cmd::ATTR_FORMAT, write_attr_format),
            (cmd::ATTR_COUNT, write_attr_count),
            (cmd::VSH_ATTR_ID, write_vsh_attr_id),
            (cmd::FIXED_ATTR_IDX, write_fixed_attr_idx),
            (cmd::FIXED_ATTR_DATA, write_fixed_attr_data),
            (cmd::PRIM_MODE, write_prim_mode),
            (cmd::PRIM_RESTART, write_prim_restart),
            (cmd::DRAW_ARRAYS_FIRST, write_draw_arrays_first),
            (cmd::DRAW_ARRAYS_COUNT, write_draw_arrays_count),
            (cmd::DRAW_ELEMENTS_ADDR, write_draw_elements_addr),
            (cmd::DRAW_ELEMENTS_FORMAT, write_draw_elements_format),
            (cmd::DRAW_ELEMENTS_COUNT, write_draw_elements_count),
            (cmd::VSH_OUT_SELECT, write_vsh_out_select),
            (cmd::VSH_OUT_MAP, write_vsh_out_map),
            (cmd::VSH_FLOAT_IDX, write_vsh_float_idx),
            (cmd::VSH_FLOAT_DATA, write_vsh_float_data),
            (cmd::VSH_BOOL, write_vsh_bool),
            (cmd::VSH_INT_IDX, write_vsh_int_idx),
            (cmd::VSH_INT_DATA, write_vsh_int_data),
            (cmd::VSH_CODE_IDX, write_vsh_code_idx),
            (cmd::VSH_CODE_DATA, write_vsh_code_data),
            (cmd::VSH_DESC_IDX, write_vsh_desc_idx),
            (cmd::VSH_DESC_DATA, write_vsh_desc_data),
            (cmd::VSH_ENTRY, write_vsh_entry),
            (cmd::VSH_END, write_vsh_end),
        ];
        for &(id, handler) in entries {
            table[id as usize] = handler;
        }
        table
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jump_start_arms_cmd_addr_and_drains_a_whole_list() {
        let mut gpu = GpuCmd::new();
        let mut bus = Bus::new();
        // One packet: payload=0 (NOP-like, unknown id), header with count=0.
        bus.write_u32(0x1000, 0); // payload
        bus.write_u32(0x1004, 0x000); // header: id 0 (unknown), count 0
        gpu.start_list(0x1000, 8);
        assert!(gpu.is_busy());
        assert!(!gpu.run_one_packet(&mut bus));
        assert!(!gpu.is_busy());
    }

    #[test]
    fn face_culling_register_updates_raster_state() {
        let mut gpu = GpuCmd::new();
        let mut bus = Bus::new();
        bus.write_u32(0x1000, 2); // CULL_BACK
        bus.write_u32(0x1004, cmd::FACE_CULLING);
        gpu.start_list(0x1000, 8);
        gpu.run_one_packet(&mut bus);
        assert_eq!(gpu.raster.cull_mode, CullMode::Back);
    }

    #[test]
    fn fixed_attribute_submission_feeds_default_w_of_one() {
        let mut gpu = GpuCmd::new();
        gpu.attrs[0].count = 0; // unconfigured: pulled straight from fixed_base
        gpu.fixed_raw[0] = [0, 0, 0];
        gpu.fixed_dirty = true;
        gpu.rebuild_fixed_cache();
        assert_eq!(gpu.fixed_base[0], [0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn inc_bit_advances_command_id_between_payloads() {
        let mut gpu = GpuCmd::new();
        let mut bus = Bus::new();
        bus.write_u32(0x1000, 10); // payload for VIEWPORT_SCALE_H
        bus.write_u32(0x1008, 20); // payload for VIEWPORT_STEP_H (id+1)
        let header = cmd::VIEWPORT_SCALE_H | 0x8000_0000 | (1 << 20);
        bus.write_u32(0x1004, header);
        gpu.start_list(0x1000, 16);
        gpu.run_one_packet(&mut bus);
        assert_eq!(gpu.raster.view_scale_h, f32::from_bits(10));
        assert_eq!(gpu.raster.view_step_h, f32::from_bits(20));
    }

    #[test]
    fn strip_winding_alternates_between_consecutive_triangles() {
        let mut gpu = GpuCmd::new();
        let mut bus = Bus::new();
        gpu.prim_mode = PrimMode::TriStrips;
        let v = |x: f32, y: f32| SoftVertex { x, y, w: 1.0, ..Default::default() };
        gpu.feed_vertex(&mut bus, v(0.0, 0.0));
        gpu.feed_vertex(&mut bus, v(1.0, 0.0));
        gpu.feed_vertex(&mut bus, v(0.0, 1.0));
        assert_eq!(gpu.triangles_rasterized, 1);
        gpu.feed_vertex(&mut bus, v(1.0, 1.0));
        assert_eq!(gpu.triangles_rasterized, 2);
    }
}

//! `image`/`imagemask`/`colorimage`: construct `Image`/`ImageMask`
//! display-list records from already-supplied sample data.
//!
//! Grounded on `operators/image.py`, `operators/image_data.py` and
//! `operators/image_type3.py`. Sample decoding and colour-space
//! conversion are the rasteriser's job; this crate only validates the
//! PLRM-mandated parameters and appends a record carrying the raw
//! sample bytes exactly as supplied. Only the in-memory-string data
//! source form is supported — a procedure data source would need to
//! pull through the evaluator one row at a time, which belongs to a
//! real page-rendering loop rather than this language core.

use crate::dict::DictKey;
use crate::display_list::{self, ImageMask as ImageMaskRecord, MaskPolarity, Record};
use crate::error::{Error, ErrorKind};
use crate::object::{CompositeRef, Name, Object, Value, View};
use crate::path::Matrix;
use crate::stack::{Context, Flow};
use crate::vm::Backing;

fn string_bytes(ctx: &Context, v: &Value) -> Result<Vec<u8>, Error> {
    let Object::String(r, view) = v.object else {
        return Err(Error::new(ErrorKind::TypeCheck, "image"));
    };
    let s = ctx.vm.get(r).and_then(Backing::as_string).ok_or_else(|| Error::new(ErrorKind::TypeCheck, "image"))?;
    Ok(s[view.offset..view.offset + view.length].to_vec())
}

fn read_matrix(ctx: &Context, v: &Value) -> Result<Matrix, Error> {
    let Object::Array(r, view) = v.object else {
        return Err(Error::new(ErrorKind::TypeCheck, "image"));
    };
    if view.length != 6 {
        return Err(Error::new(ErrorKind::RangeCheck, "image"));
    }
    let arr = ctx.vm.get(r).and_then(Backing::as_array).ok_or_else(|| Error::new(ErrorKind::TypeCheck, "image"))?;
    let mut n = [0.0; 6];
    for (i, slot) in n.iter_mut().enumerate() {
        *slot = arr[view.offset + i].object.as_number().ok_or_else(|| Error::new(ErrorKind::TypeCheck, "image"))?.as_f64();
    }
    Ok(Matrix { a: n[0], b: n[1], c: n[2], d: n[3], e: n[4], f: n[5] })
}

fn valid_bits_per_component(bps: i32) -> bool {
    matches!(bps, 1 | 2 | 4 | 8 | 12)
}

struct ImageParams {
    width: i32,
    height: i32,
    bits_per_component: i32,
    matrix: Matrix,
    data: Vec<u8>,
}

fn pop_five_operand_form(ctx: &mut Context, op: &'static str) -> Result<ImageParams, Error> {
    let data_v = ctx.pop()?;
    let matrix_v = ctx.pop()?;
    let bps_v = ctx.pop()?;
    let height_v = ctx.pop()?;
    let width_v = ctx.pop()?;

    let (Object::Int(width), Object::Int(height), Object::Int(bps)) = (&width_v.object, &height_v.object, &bps_v.object) else {
        return Err(Error::new(ErrorKind::TypeCheck, op));
    };
    let (width, height, bps) = (*width, *height, *bps);
    if width <= 0 || height <= 0 {
        return Err(Error::new(ErrorKind::RangeCheck, op));
    }
    if !valid_bits_per_component(bps) {
        return Err(Error::new(ErrorKind::RangeCheck, op));
    }
    let matrix = read_matrix(ctx, &matrix_v)?;
    let data = string_bytes(ctx, &data_v)?;
    Ok(ImageParams { width, height, bits_per_component: bps, matrix, data })
}

fn dict_get_int(ctx: &Context, r: CompositeRef, key: &str) -> Option<i32> {
    let Some(Backing::Dict(d)) = ctx.vm.get(r) else { return None };
    let v = d.get(&DictKey::Name(Name::new(key.as_bytes())))?;
    match v.object {
        Object::Int(i) => Some(i),
        _ => None,
    }
}

fn dict_get(ctx: &Context, r: CompositeRef, key: &str) -> Option<Value> {
    let Some(Backing::Dict(d)) = ctx.vm.get(r) else { return None };
    d.get(&DictKey::Name(Name::new(key.as_bytes()))).cloned()
}

fn pop_dict_form(ctx: &mut Context, op: &'static str) -> Result<ImageParams, Error> {
    let dict_v = ctx.pop()?;
    let Object::Dict(r) = dict_v.object else {
        return Err(Error::new(ErrorKind::TypeCheck, op));
    };
    let width = dict_get_int(ctx, r, "Width").ok_or_else(|| Error::new(ErrorKind::TypeCheck, op))?;
    let height = dict_get_int(ctx, r, "Height").ok_or_else(|| Error::new(ErrorKind::TypeCheck, op))?;
    let bps = dict_get_int(ctx, r, "BitsPerComponent").unwrap_or(1);
    if width <= 0 || height <= 0 {
        return Err(Error::new(ErrorKind::RangeCheck, op));
    }
    if !valid_bits_per_component(bps) {
        return Err(Error::new(ErrorKind::RangeCheck, op));
    }
    let matrix_v = dict_get(ctx, r, "ImageMatrix").ok_or_else(|| Error::new(ErrorKind::TypeCheck, op))?;
    let matrix = read_matrix(ctx, &matrix_v)?;
    let data_v = dict_get(ctx, r, "DataSource").ok_or_else(|| Error::new(ErrorKind::TypeCheck, op))?;
    let data = string_bytes(ctx, &data_v)?;
    Ok(ImageParams { width, height, bits_per_component: bps, matrix, data })
}

fn op_image(ctx: &mut Context) -> Result<Flow, Error> {
    let is_dict_form = matches!(ctx.operand.last().map(|v| &v.object), Some(Object::Dict(_)));
    let params = if is_dict_form { pop_dict_form(ctx, "image")? } else { pop_five_operand_form(ctx, "image")? };
    let gstate = display_list::gstate_ref(&ctx.gstate);
    ctx.display_list.push(Record::Image(display_list::Image {
        width: params.width as u32,
        height: params.height as u32,
        bits_per_component: params.bits_per_component as u8,
        components: 1,
        decode: vec![0.0, 1.0],
        matrix: params.matrix,
        ctm: ctx.gs().ctm,
        sample_data: params.data,
        interpolate: false,
        mask_width: None,
        mask_height: None,
        mask_polarity: None,
        gstate,
    }));
    Ok(Flow::Ok)
}

fn op_imagemask(ctx: &mut Context) -> Result<Flow, Error> {
    let data_v = ctx.pop()?;
    let matrix_v = ctx.pop()?;
    let polarity_v = ctx.pop()?;
    let height_v = ctx.pop()?;
    let width_v = ctx.pop()?;

    let (Object::Int(width), Object::Int(height), Object::Bool(polarity)) =
        (&width_v.object, &height_v.object, &polarity_v.object)
    else {
        return Err(Error::new(ErrorKind::TypeCheck, "imagemask"));
    };
    let (width, height, polarity) = (*width, *height, *polarity);
    if width <= 0 || height <= 0 {
        return Err(Error::new(ErrorKind::RangeCheck, "imagemask"));
    }
    let matrix = read_matrix(ctx, &matrix_v)?;
    let data = string_bytes(ctx, &data_v)?;

    let gstate = display_list::gstate_ref(&ctx.gstate);
    ctx.display_list.push(Record::ImageMask(ImageMaskRecord {
        width: width as u32,
        height: height as u32,
        polarity: if polarity { MaskPolarity::OneIsOpaque } else { MaskPolarity::ZeroIsOpaque },
        matrix,
        ctm: ctx.gs().ctm,
        sample_data: data,
        color: ctx.gs().color,
        gstate,
    }));
    Ok(Flow::Ok)
}

fn op_colorimage(ctx: &mut Context) -> Result<Flow, Error> {
    let multi_v = ctx.pop()?;
    let ncomp_v = ctx.pop()?;
    let Object::Bool(multi) = multi_v.object else {
        return Err(Error::new(ErrorKind::TypeCheck, "colorimage"));
    };
    let Object::Int(ncomp) = ncomp_v.object else {
        return Err(Error::new(ErrorKind::TypeCheck, "colorimage"));
    };
    if !matches!(ncomp, 1 | 3 | 4) {
        return Err(Error::new(ErrorKind::RangeCheck, "colorimage"));
    }

    let sources = if multi { ncomp as usize } else { 1 };
    let mut data_sources = Vec::with_capacity(sources);
    for _ in 0..sources {
        let v = ctx.pop()?;
        data_sources.push(string_bytes(ctx, &v)?);
    }
    data_sources.reverse();
    let matrix_v = ctx.pop()?;
    let bps_v = ctx.pop()?;
    let height_v = ctx.pop()?;
    let width_v = ctx.pop()?;

    let (Object::Int(width), Object::Int(height), Object::Int(bps)) = (&width_v.object, &height_v.object, &bps_v.object)
    else {
        return Err(Error::new(ErrorKind::TypeCheck, "colorimage"));
    };
    let (width, height, bps) = (*width, *height, *bps);
    if width <= 0 || height <= 0 {
        return Err(Error::new(ErrorKind::RangeCheck, "colorimage"));
    }
    if !valid_bits_per_component(bps) {
        return Err(Error::new(ErrorKind::RangeCheck, "colorimage"));
    }
    let matrix = read_matrix(ctx, &matrix_v)?;

    // Multiple data sources (InterleaveType 3-like) get concatenated in
    // source order; a single source is assumed already component-interleaved.
    let data = data_sources.concat();
    let gstate = display_list::gstate_ref(&ctx.gstate);
    ctx.display_list.push(Record::Image(display_list::Image {
        width: width as u32,
        height: height as u32,
        bits_per_component: bps as u8,
        components: ncomp as u8,
        decode: vec![0.0, 1.0].repeat(ncomp as usize),
        matrix,
        ctm: ctx.gs().ctm,
        sample_data: data,
        interpolate: false,
        mask_width: None,
        mask_height: None,
        mask_polarity: None,
        gstate,
    }));
    Ok(Flow::Ok)
}

pub fn install(ctx: &mut Context) {
    ctx.register(b"image", op_image);
    ctx.register(b"imagemask", op_imagemask);
    ctx.register(b"colorimage", op_colorimage);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::View as ObjView;

    fn push_identity_matrix(ctx: &mut Context) -> Value {
        let origin = ctx.alloc_origin();
        let nums = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];
        let values: Vec<Value> = nums.iter().map(|&n| Value::literal(Object::Real(n))).collect();
        let r = ctx.vm.alloc(origin, Backing::Array(values));
        Value::literal(Object::Array(r, ObjView { offset: 0, length: 6 }))
    }

    fn push_string(ctx: &mut Context, bytes: &[u8]) -> Value {
        let origin = ctx.alloc_origin();
        let r = ctx.vm.alloc(origin, Backing::String(bytes.to_vec()));
        Value::literal(Object::String(r, ObjView { offset: 0, length: bytes.len() }))
    }

    #[test]
    fn image_five_operand_form_appends_image_record() {
        let mut ctx = Context::new();
        ctx.push(Value::literal(Object::Int(2))).unwrap();
        ctx.push(Value::literal(Object::Int(2))).unwrap();
        ctx.push(Value::literal(Object::Int(8))).unwrap();
        let m = push_identity_matrix(&mut ctx);
        ctx.push(m).unwrap();
        let s = push_string(&mut ctx, &[0, 1, 2, 3]);
        ctx.push(s).unwrap();
        op_image(&mut ctx).unwrap();
        assert_eq!(ctx.display_list.len(), 1);
    }

    #[test]
    fn imagemask_rejects_non_positive_dimensions() {
        let mut ctx = Context::new();
        ctx.push(Value::literal(Object::Int(0))).unwrap();
        ctx.push(Value::literal(Object::Int(2))).unwrap();
        ctx.push(Value::literal(Object::Bool(true))).unwrap();
        let m = push_identity_matrix(&mut ctx);
        ctx.push(m).unwrap();
        let s = push_string(&mut ctx, &[0]);
        ctx.push(s).unwrap();
        assert!(op_imagemask(&mut ctx).is_err());
    }
}

//! Fixed 481-entry system name table (PLRM binary tokens 145/146 and
//! binary-object-sequence name references). Indices 226-255 are reserved
//! and carry an empty name; looking one up is a `syntaxerror` at the
//! call site, not a panic here.

/// Number of entries in the system name table.
pub const SYSTEM_NAME_COUNT: usize = 481;

/// `SYSTEM_NAMES[i]` is empty for the 30 reserved slots 226..=255.
pub const SYSTEM_NAMES: [&[u8]; 481] = [
    b"abs", b"add", b"aload", b"anchorsearch", b"and", b"arc", b"arcn", b"arct", b"arcto", b"array",
    b"ashow", b"astore", b"awidthshow", b"begin", b"bind", b"bitshift", b"ceiling", b"charpath", b"clear", b"cleartomark",
    b"clip", b"clippath", b"closepath", b"concat", b"concatmatrix", b"copy", b"count", b"counttomark", b"currentcmykcolor", b"currentdash",
    b"currentdict", b"currentfile", b"currentfont", b"currentgray", b"currentgstate", b"currenthsbcolor", b"currentlinecap", b"currentlinejoin", b"currentlinewidth", b"currentmatrix",
    b"currentpoint", b"currentrgbcolor", b"currentshared", b"curveto", b"cvi", b"cvlit", b"cvn", b"cvr", b"cvrs", b"cvs",
    b"cvx", b"def", b"defineusername", b"dict", b"div", b"dtransform", b"dup", b"end", b"eoclip", b"eofill",
    b"eoviewclip", b"eq", b"exch", b"exec", b"exit", b"file", b"fill", b"findfont", b"flattenpath", b"floor",
    b"flush", b"flushfile", b"for", b"forall", b"ge", b"get", b"getinterval", b"grestore", b"gsave", b"gstate",
    b"gt", b"identmatrix", b"idiv", b"idtransform", b"if", b"ifelse", b"image", b"imagemask", b"index", b"ineofill",
    b"infill", b"initviewclip", b"inueofill", b"inufill", b"invertmatrix", b"itransform", b"known", b"le", b"length", b"lineto",
    b"load", b"loop", b"lt", b"makefont", b"matrix", b"maxlength", b"mod", b"moveto", b"mul", b"ne",
    b"neg", b"newpath", b"not", b"null", b"or", b"pathbbox", b"pathforall", b"pop", b"print", b"printobject",
    b"put", b"putinterval", b"rcurveto", b"read", b"readhexstring", b"readline", b"readstring", b"rectclip", b"rectfill", b"rectstroke",
    b"rectviewclip", b"repeat", b"restore", b"rlineto", b"rmoveto", b"roll", b"rotate", b"round", b"save", b"scale",
    b"scalefont", b"search", b"selectfont", b"setbbox", b"setcachedevice", b"setcachedevice2", b"setcharwidth", b"setcmykcolor", b"setdash", b"setfont",
    b"setgray", b"setgstate", b"sethsbcolor", b"setlinecap", b"setlinejoin", b"setlinewidth", b"setmatrix", b"setrgbcolor", b"setshared", b"shareddict",
    b"show", b"showpage", b"stop", b"stopped", b"store", b"string", b"stringwidth", b"stroke", b"strokepath", b"sub",
    b"systemdict", b"token", b"transform", b"translate", b"truncate", b"type", b"uappend", b"ucache", b"ueofill", b"ufill",
    b"undef", b"upath", b"userdict", b"ustroke", b"viewclip", b"viewclippath", b"where", b"widthshow", b"write", b"writehexstring",
    b"writeobject", b"writestring", b"wtranslation", b"xor", b"xshow", b"xyshow", b"yshow", b"FontDirectory", b"SharedFontDirectory", b"Courier",
    b"Courier-Bold", b"Courier-BoldOblique", b"Courier-Oblique", b"Helvetica", b"Helvetica-Bold", b"Helvetica-BoldOblique", b"Helvetica-Oblique", b"Symbol", b"Times-Bold", b"Times-BoldItalic",
    b"Times-Italic", b"Times-Roman", b"execuserobject", b"currentcolor", b"currentcolorspace", b"currentglobal", b"execform", b"filter", b"findresource", b"globaldict",
    b"makepattern", b"setcolor", b"setcolorspace", b"setglobal", b"setpagedevice", b"setpattern", b"", b"", b"", b"",
    b"", b"", b"", b"", b"", b"", b"", b"", b"", b"",
    b"", b"", b"", b"", b"", b"", b"", b"", b"", b"",
    b"", b"", b"", b"", b"", b"", b"=", b"==", b"ISOLatin1Encoding", b"StandardEncoding",
    b"[", b"]", b"atan", b"banddevice", b"bytesavailable", b"cachestatus", b"closefile", b"colorimage", b"condition", b"copypage",
    b"cos", b"countdictstack", b"countexecstack", b"cshow", b"currentblackgeneration", b"currentcacheparams", b"currentcolorscreen", b"currentcolortransfer", b"currentcontext", b"currentflat",
    b"currenthalftone", b"currenthalftonephase", b"currentmiterlimit", b"currentobjectformat", b"currentpacking", b"currentscreen", b"currentstrokeadjust", b"currenttransfer", b"currentundercolorremoval", b"defaultmatrix",
    b"definefont", b"deletefile", b"detach", b"deviceinfo", b"dictstack", b"echo", b"erasepage", b"errordict", b"execstack", b"executeonly",
    b"exp", b"false", b"filenameforall", b"fileposition", b"fork", b"framedevice", b"grestoreall", b"handleerror", b"initclip", b"initgraphics",
    b"initmatrix", b"instroke", b"inustroke", b"join", b"kshow", b"ln", b"lock", b"log", b"mark", b"monitor",
    b"noaccess", b"notify", b"nulldevice", b"packedarray", b"quit", b"rand", b"rcheck", b"readonly", b"realtime", b"renamefile",
    b"renderbands", b"resetfile", b"reversepath", b"rootfont", b"rrand", b"run", b"scheck", b"setblackgeneration", b"setcachelimit", b"setcacheparams",
    b"setcolorscreen", b"setcolortransfer", b"setfileposition", b"setflat", b"sethalftone", b"sethalftonephase", b"setmiterlimit", b"setobjectformat", b"setpacking", b"setscreen",
    b"setstrokeadjust", b"settransfer", b"setucacheparams", b"setundercolorremoval", b"sin", b"sqrt", b"srand", b"stack", b"status", b"statusdict",
    b"true", b"ucachestatus", b"undefinefont", b"usertime", b"ustrokepath", b"version", b"vmreclaim", b"vmstatus", b"wait", b"wcheck",
    b"xcheck", b"yield", b"defineuserobject", b"undefineuserobject", b"UserObjects", b"cleardictstack", b"A", b"B", b"C", b"D",
    b"E", b"F", b"G", b"H", b"I", b"J", b"K", b"L", b"M", b"N",
    b"O", b"P", b"Q", b"R", b"S", b"T", b"U", b"V", b"W", b"X",
    b"Y", b"Z", b"a", b"b", b"c", b"d", b"e", b"f", b"g", b"h",
    b"i", b"j", b"k", b"l", b"m", b"n", b"o", b"p", b"q", b"r",
    b"s", b"t", b"u", b"v", b"w", b"x", b"y", b"z", b"setvmthreshold", b"<<",
    b">>", b"currentcolorrendering", b"currentdevparams", b"currentoverprint", b"currentpagedevice", b"currentsystemparams", b"currentuserparams", b"defineresource", b"findencoding", b"gcheck",
    b"glyphshow", b"languagelevel", b"product", b"pstack", b"resourceforall", b"resourcestatus", b"revision", b"serialnumber", b"setcolorrendering", b"setdevparams",
    b"setoverprint", b"setsystemparams", b"setuserparams", b"startjob", b"undefineresource", b"GlobalFontDirectory", b"ASCII85Decode", b"ASCII85Encode", b"ASCIIHexDecode", b"ASCIIHexEncode",
    b"CCITTFaxDecode", b"CCITTFaxEncode", b"DCTDecode", b"DCTEncode", b"LZWDecode", b"LZWEncode", b"NullEncode", b"RunLengthDecode", b"RunLengthEncode", b"SubFileDecode",
    b"CIEBasedA", b"CIEBasedABC", b"DeviceCMYK", b"DeviceGray", b"DeviceRGB", b"Indexed", b"Pattern", b"Separation", b"CIEBasedDEF", b"CIEBasedDEFG",
    b"DeviceN",
];

/// Reserved-slot check (PLRM: indices 226..=255 have no defined name).
#[must_use]
pub fn is_reserved(index: usize) -> bool {
    (226..=255).contains(&index)
}

/// Look up a system name by index, honoring the reserved gap.
#[must_use]
pub fn lookup(index: usize) -> Option<&'static [u8]> {
    if index >= SYSTEM_NAME_COUNT || is_reserved(index) {
        return None;
    }
    Some(SYSTEM_NAMES[index])
}

/// Reverse lookup, used when *writing* binary object sequences / tokens:
/// prefer the system-name encoding when a name is present in the table.
#[must_use]
pub fn index_of(name: &[u8]) -> Option<usize> {
    if name.is_empty() {
        return None;
    }
    SYSTEM_NAMES.iter().position(|&n| n == name).filter(|&i| !is_reserved(i))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_481_entries() {
        assert_eq!(SYSTEM_NAMES.len(), 481);
    }

    #[test]
    fn reserved_gap_has_no_lookup() {
        for i in 226..=255 {
            assert!(lookup(i).is_none(), "index {i} should be reserved");
        }
    }

    #[test]
    fn round_trips_known_names() {
        assert_eq!(lookup(0), Some(&b"abs"[..]));
        assert_eq!(lookup(480), Some(&b"DeviceN"[..]));
        assert_eq!(index_of(b"abs"), Some(0));
        assert_eq!(index_of(b"DeviceN"), Some(480));
        assert_eq!(index_of(b"not-a-system-name"), None);
    }
}

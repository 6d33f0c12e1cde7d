//! Mock D3DX image codec and effect compiler.

use std::ffi::{c_void, CStr};
use std::rc::Rc;

use fxproc_core::ffi::{
    D3DERR_INVALIDCALL, D3DRTYPE_CUBETEXTURE, D3DRTYPE_TEXTURE, D3DRTYPE_VOLUMETEXTURE,
    D3DXERR_INVALIDDATA, D3DXIMAGE_INFO, D3DPOOL_MANAGED, E_FAIL, HRESULT, S_OK,
};
use fxproc_core::ComPtr;

use super::objects::{EffectProgram, ObjectData, ObjectKind, TextureData};
use super::{Call, MockFile, MockShared};
use crate::services::D3dxServices;

/// [`D3dxServices`] over a [`super::MockRuntime`]'s file store.
pub struct MockServices {
    shared: Rc<MockShared>,
}

impl MockServices {
    pub(crate) fn new(shared: Rc<MockShared>) -> Self {
        Self { shared }
    }

    fn create_from_file(
        &self,
        path: &CStr,
        format: u32,
        expected_type: u32,
        kind: ObjectKind,
        texture: &mut *mut c_void,
    ) -> HRESULT {
        let path = path.to_string_lossy();
        let info = match self.shared.file(&path) {
            Some(MockFile::Image(info)) if info.ResourceType == expected_type => info,
            Some(_) => return D3DXERR_INVALIDDATA,
            None => return E_FAIL,
        };
        let data = TextureData {
            width: info.Width,
            height: info.Height,
            depth: 1,
            levels: info.MipLevels.max(1),
            format,
            usage: 0,
            pool: D3DPOOL_MANAGED,
        };
        *texture = self.shared.spawn(kind, ObjectData::Texture(data));
        S_OK
    }

    fn compile(&self, source: &str, effect: &mut *mut c_void, errors: &mut *mut c_void) -> HRESULT {
        match parse_effect(source) {
            Ok(program) => {
                *effect = self.shared.spawn(
                    ObjectKind::Effect,
                    ObjectData::Effect {
                        program,
                        technique: Default::default(),
                    },
                );
                S_OK
            }
            Err(message) => {
                let mut bytes = message.into_bytes();
                bytes.push(0);
                *errors = self.shared.spawn(ObjectKind::Buffer, ObjectData::Buffer(bytes));
                D3DXERR_INVALIDDATA
            }
        }
    }
}

/// Parse the mock effect source format described in [`super`].
fn parse_effect(source: &str) -> Result<EffectProgram, String> {
    let mut program = EffectProgram::default();
    for (number, line) in source.lines().enumerate() {
        let line = line.split("//").next().unwrap_or("").trim();
        let mut words = line.split_whitespace();
        match words.next() {
            None => {}
            Some("technique") => {
                let name = words
                    .next()
                    .ok_or_else(|| format!("({}): technique without a name", number + 1))?;
                let passes = match words.next() {
                    Some(n) => n
                        .parse()
                        .map_err(|_| format!("({}): bad pass count \"{n}\"", number + 1))?,
                    None => 1,
                };
                program.techniques.push((name.to_string(), passes));
            }
            Some("param") => {
                let name = words
                    .next()
                    .ok_or_else(|| format!("({}): param without a name", number + 1))?;
                program.parameters.push(name.to_string());
            }
            Some("error") => {
                let rest: Vec<&str> = words.collect();
                return Err(format!("({}): error: {}", number + 1, rest.join(" ")));
            }
            Some(other) => {
                return Err(format!("({}): unexpected token \"{other}\"", number + 1));
            }
        }
    }
    Ok(program)
}

impl D3dxServices for MockServices {
    unsafe fn get_image_info_from_file(&self, path: &CStr, info: &mut D3DXIMAGE_INFO) -> HRESULT {
        let path = path.to_string_lossy().into_owned();
        self.shared.record(Call::GetImageInfo(path.clone()));
        if let Some(hr) = self.shared.injected("D3DXGetImageInfoFromFile") {
            return hr;
        }
        match self.shared.file(&path) {
            Some(MockFile::Image(found)) => {
                *info = found;
                S_OK
            }
            _ => E_FAIL,
        }
    }

    unsafe fn create_texture_from_file(
        &self,
        _device: ComPtr,
        path: &CStr,
        format: u32,
        texture: &mut *mut c_void,
    ) -> HRESULT {
        self.shared
            .record(Call::CreateTextureFromFile(path.to_string_lossy().into_owned()));
        if let Some(hr) = self.shared.injected("D3DXCreateTextureFromFileEx") {
            return hr;
        }
        self.create_from_file(path, format, D3DRTYPE_TEXTURE, ObjectKind::Texture, texture)
    }

    unsafe fn create_cube_texture_from_file(
        &self,
        _device: ComPtr,
        path: &CStr,
        format: u32,
        texture: &mut *mut c_void,
    ) -> HRESULT {
        self.shared
            .record(Call::CreateCubeTextureFromFile(path.to_string_lossy().into_owned()));
        if let Some(hr) = self.shared.injected("D3DXCreateCubeTextureFromFileEx") {
            return hr;
        }
        self.create_from_file(
            path,
            format,
            D3DRTYPE_CUBETEXTURE,
            ObjectKind::CubeTexture,
            texture,
        )
    }

    unsafe fn save_texture_to_file(&self, path: &CStr, file_format: u32, texture: ComPtr) -> HRESULT {
        let path = path.to_string_lossy().into_owned();
        let Some(obj) = self.shared.lookup(texture.as_raw()) else {
            return D3DERR_INVALIDCALL;
        };
        self.shared.record(Call::SaveTexture {
            path: path.clone(),
            file_format,
            texture: obj.id,
        });
        if let Some(hr) = self.shared.injected("D3DXSaveTextureToFile") {
            return hr;
        }
        let Some(tex) = obj.texture() else {
            return D3DERR_INVALIDCALL;
        };
        let resource_type = match obj.kind {
            ObjectKind::CubeTexture => D3DRTYPE_CUBETEXTURE,
            ObjectKind::VolumeTexture => D3DRTYPE_VOLUMETEXTURE,
            _ => D3DRTYPE_TEXTURE,
        };
        self.shared.put_file(
            &path,
            MockFile::Image(D3DXIMAGE_INFO {
                Width: tex.width,
                Height: tex.height,
                Depth: tex.depth,
                MipLevels: tex.levels,
                Format: tex.format,
                ResourceType: resource_type,
                ImageFileFormat: file_format,
            }),
        );
        S_OK
    }

    unsafe fn create_effect_from_file(
        &self,
        _device: ComPtr,
        path: &CStr,
        _flags: u32,
        effect: &mut *mut c_void,
        errors: &mut *mut c_void,
    ) -> HRESULT {
        let path = path.to_string_lossy().into_owned();
        self.shared.record(Call::CompileEffect(path.clone()));
        if let Some(hr) = self.shared.injected("D3DXCreateEffectFromFile") {
            return hr;
        }
        match self.shared.file(&path) {
            Some(MockFile::EffectSource(source)) => self.compile(&source, effect, errors),
            _ => E_FAIL,
        }
    }

    unsafe fn create_effect(
        &self,
        _device: ComPtr,
        source: &[u8],
        _flags: u32,
        effect: &mut *mut c_void,
        errors: &mut *mut c_void,
    ) -> HRESULT {
        self.shared.record(Call::CompileEffect("<string>".to_string()));
        if let Some(hr) = self.shared.injected("D3DXCreateEffect") {
            return hr;
        }
        self.compile(&String::from_utf8_lossy(source), effect, errors)
    }
}

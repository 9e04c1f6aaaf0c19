use std::collections::BTreeMap;
use vista_common::MeshId;
use vista_scene::SourceMesh;

use crate::device::{BufferKind, RenderDevice};
use crate::vertex::{interleave, Vertex};
use crate::MeshError;

/// GPU-resident geometry for one distinct mesh shape.
///
/// Owns its buffers and layout object; dropping the record releases them.
pub struct MeshRecord<D: RenderDevice> {
    mesh_id: MeshId,
    vertex_buffer: D::Buffer,
    index_buffer: D::Buffer,
    vertex_layout: D::VertexLayout,
    vertex_count: u32,
    index_count: u32,
}

impl<D: RenderDevice> MeshRecord<D> {
    pub fn mesh_id(&self) -> MeshId {
        self.mesh_id
    }

    pub fn vertex_buffer(&self) -> &D::Buffer {
        &self.vertex_buffer
    }

    pub fn index_buffer(&self) -> &D::Buffer {
        &self.index_buffer
    }

    pub fn vertex_layout(&self) -> &D::VertexLayout {
        &self.vertex_layout
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}

/// Build-once store of mesh records, iterated in build order.
pub struct MeshStore<D: RenderDevice> {
    records: Vec<MeshRecord<D>>,
    by_id: BTreeMap<MeshId, usize>,
}

impl<D: RenderDevice> Default for MeshStore<D> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            by_id: BTreeMap::new(),
        }
    }
}

impl<D: RenderDevice> MeshStore<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upload interleaved vertices and u32 indices for `mesh_id`.
    ///
    /// A mesh id may be built once; a second build is rejected and leaves the
    /// existing record untouched. Indices must address existing vertices.
    pub fn build(
        &mut self,
        device: &mut D,
        mesh_id: MeshId,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> Result<&MeshRecord<D>, MeshError> {
        if self.by_id.contains_key(&mesh_id) {
            return Err(MeshError::DuplicateMesh(mesh_id));
        }
        if let Some((position, &index)) = indices
            .iter()
            .enumerate()
            .find(|&(_, &i)| i as usize >= vertices.len())
        {
            return Err(MeshError::IndexOutOfRange {
                mesh: mesh_id,
                position,
                index,
                vertex_count: vertices.len(),
            });
        }

        let vertex_count =
            u32::try_from(vertices.len()).map_err(|_| MeshError::TooLarge(mesh_id))?;
        let index_count = u32::try_from(indices.len()).map_err(|_| MeshError::TooLarge(mesh_id))?;

        let vertex_buffer = device.create_buffer(
            BufferKind::Vertex,
            &format!("{mesh_id} vertices"),
            bytemuck::cast_slice(vertices),
        );
        let index_buffer = device.create_buffer(
            BufferKind::Index,
            &format!("{mesh_id} indices"),
            bytemuck::cast_slice(indices),
        );
        let vertex_layout = device.create_vertex_layout(&vertex_buffer, &index_buffer, &Vertex::LAYOUT);

        tracing::debug!(%mesh_id, vertex_count, index_count, "mesh uploaded");

        let slot = self.records.len();
        self.records.push(MeshRecord {
            mesh_id,
            vertex_buffer,
            index_buffer,
            vertex_layout,
            vertex_count,
            index_count,
        });
        self.by_id.insert(mesh_id, slot);
        Ok(&self.records[slot])
    }

    /// Interleave a provider mesh and upload it.
    pub fn build_from_source(
        &mut self,
        device: &mut D,
        source: &SourceMesh,
    ) -> Result<&MeshRecord<D>, MeshError> {
        let vertices = interleave(&source.positions, &source.normals, &source.uvs)
            .map_err(|e| e.for_mesh(source.id))?;
        self.build(device, source.id, &vertices, &source.indices)
    }

    pub fn get(&self, mesh_id: MeshId) -> Option<&MeshRecord<D>> {
        self.by_id.get(&mesh_id).map(|&i| &self.records[i])
    }

    /// Records in the order they were built.
    pub fn iter(&self) -> impl Iterator<Item = &MeshRecord<D>> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
